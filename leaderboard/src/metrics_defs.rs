//! Metrics definitions for the ranking cache.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_WRITE_FAILURES: MetricDef = MetricDef {
    name: "leaderboard.write.failures",
    metric_type: MetricType::Counter,
    description: "Cache writes that failed and left a stale entry. Tagged with op.",
};

pub const CACHE_READ_FAILURES: MetricDef = MetricDef {
    name: "leaderboard.read.failures",
    metric_type: MetricType::Counter,
    description: "Cache reads that failed. Tagged with op.",
};

pub const ALL_METRICS: &[MetricDef] = &[CACHE_WRITE_FAILURES, CACHE_READ_FAILURES];
