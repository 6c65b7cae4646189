//! Metrics definitions for the review pipelines.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REVIEWS_SUBMITTED: MetricDef = MetricDef {
    name: "reviews.submitted",
    metric_type: MetricType::Counter,
    description: "Reviews persisted and aggregated. Tagged with classification (real or fallback).",
};

pub const REVIEWS_RETRACTED: MetricDef = MetricDef {
    name: "reviews.retracted",
    metric_type: MetricType::Counter,
    description: "Reviews deleted with their score removed from the aggregate",
};

pub const PERSISTENCE_ABORTS: MetricDef = MetricDef {
    name: "reviews.persistence.aborts",
    metric_type: MetricType::Counter,
    description: "Operations aborted by a durable store failure. Tagged with op and step.",
};

pub const CACHE_STALE: MetricDef = MetricDef {
    name: "reviews.cache.stale",
    metric_type: MetricType::Counter,
    description: "Durable writes whose ranking cache sync failed. Tagged with op.",
};

pub const AGGREGATE_LOCK_WAIT: MetricDef = MetricDef {
    name: "reviews.aggregate.lock_wait",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting for a restaurant's aggregate lock in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REVIEWS_SUBMITTED,
    REVIEWS_RETRACTED,
    PERSISTENCE_ABORTS,
    CACHE_STALE,
    AGGREGATE_LOCK_WAIT,
];
