//! Client for the external sentiment classification service.
//!
//! [`SentimentClassifier`] never fails observably: every error path,
//! including an exhausted retry budget or the overall deadline, resolves to
//! [`Classification::fallback`].

pub mod classifier;
pub mod config;
pub mod metrics_defs;
pub mod types;

pub use classifier::{ClassifierError, SentimentAnalyzer, SentimentClassifier};
pub use config::ClassifierConfig;
pub use types::{Classification, SentimentLabel};
