//! Review ingestion and retraction over a durable store and a best-effort
//! ranking cache.
//!
//! A submission is classify, persist, aggregate, cache-sync. A retraction is
//! recompute, persist, cache-sync, delete. Aggregate writes for one
//! restaurant are serialized by [`aggregator::ScoreAggregator`]; cache writes
//! may fail without failing the operation.

pub mod aggregator;
pub mod cache_sync;
pub mod errors;
pub mod metrics_defs;
pub mod retraction;
pub mod service;
pub mod store;
pub mod submission;
pub mod types;

#[cfg(test)]
mod testutils;

pub use cache_sync::CacheSync;
pub use errors::ReviewError;
pub use service::ReviewService;
pub use store::{InMemoryStore, ReviewStore, StoreError};
pub use types::{Restaurant, RestaurantDetails, Review, ReviewStatistics};
