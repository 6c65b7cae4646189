//! Metrics definitions for the sentiment classifier.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CLASSIFY_REQUESTS: MetricDef = MetricDef {
    name: "classifier.requests",
    metric_type: MetricType::Counter,
    description: "Number of classification calls made by callers",
};

pub const CLASSIFY_RETRIES: MetricDef = MetricDef {
    name: "classifier.retries",
    metric_type: MetricType::Counter,
    description: "Number of retries after the service answered not ready",
};

pub const CLASSIFY_FALLBACKS: MetricDef = MetricDef {
    name: "classifier.fallbacks",
    metric_type: MetricType::Counter,
    description: "Number of classifications resolved to the neutral fallback. Tagged with reason.",
};

pub const CLASSIFY_DURATION: MetricDef = MetricDef {
    name: "classifier.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a classification in seconds, retries included",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CLASSIFY_REQUESTS,
    CLASSIFY_RETRIES,
    CLASSIFY_FALLBACKS,
    CLASSIFY_DURATION,
];
