use crate::metrics_defs::CACHE_STALE;
use crate::types::Restaurant;
use leaderboard::RankingCache;
use serde::Serialize;
use shared::counter;

/// Outcome of the best-effort ranking cache write that follows a durable
/// write. Never affects whether the operation succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSync {
    Synced,
    /// The cache kept its previous entry for this restaurant and will serve
    /// it until the next successful write.
    Stale,
}

/// Pushes the restaurant's current aggregate to the ranking cache, logging
/// and discarding any failure.
pub(crate) async fn sync_cache(
    cache: &RankingCache,
    restaurant: &Restaurant,
    op: &'static str,
) -> CacheSync {
    match cache.upsert(&restaurant.ranking_entry()).await {
        Ok(()) => CacheSync::Synced,
        Err(e) => {
            counter!(CACHE_STALE, "op" => op).increment(1);
            tracing::warn!(
                restaurant_id = restaurant.id,
                op,
                error = %e,
                "Durable write committed but ranking cache is stale"
            );
            CacheSync::Stale
        }
    }
}

/// Removes the restaurant from the ranking cache, logging any failure.
pub(crate) async fn evict_cache(cache: &RankingCache, restaurant_id: u64) -> CacheSync {
    match cache.remove(restaurant_id).await {
        Ok(()) => CacheSync::Synced,
        Err(e) => {
            counter!(CACHE_STALE, "op" => "delete_restaurant").increment(1);
            tracing::warn!(restaurant_id, error = %e, "Deleted restaurant is still ranked");
            CacheSync::Stale
        }
    }
}
