//! Best-effort ranking cache over restaurant average scores.
//!
//! The cache is a read-optimized projection of the durable aggregates and is
//! never authoritative: a failed write leaves the previous entry in place
//! until the next successful write for that restaurant. Nothing reconciles
//! the two stores in the background.

pub mod cache;
pub mod config;
pub mod metrics_defs;
pub mod redis_store;
pub mod store;

pub use cache::{RankedEntry, RankingCache, RankingEntry};
pub use config::{LeaderboardConfig, RankingStoreType};
pub use store::{InMemoryRankingStore, RankingError, RankingStore};

use redis_store::RedisRankingStore;
use std::sync::Arc;

/// Builds the sorted-index store selected by the configuration.
pub async fn get_store(
    store_type: &RankingStoreType,
) -> Result<Arc<dyn RankingStore>, RankingError> {
    match store_type {
        RankingStoreType::Redis { url } => Ok(Arc::new(RedisRankingStore::connect(url).await?)),
        RankingStoreType::Memory => Ok(Arc::new(InMemoryRankingStore::new())),
    }
}
