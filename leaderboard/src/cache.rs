use crate::config::LeaderboardConfig;
use crate::metrics_defs::{CACHE_READ_FAILURES, CACHE_WRITE_FAILURES};
use crate::store::{RankingError, RankingStore};
use serde::{Deserialize, Serialize};
use shared::counter;
use std::sync::Arc;

/// Denormalized projection of a restaurant aggregate, as stored in the
/// detail blob. Possibly stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub restaurant_id: u64,
    pub name: String,
    pub average_score: f64,
    pub review_count: u64,
    pub cuisine_type: Option<String>,
}

/// An entry with its rank derived from output position. Rank is never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: u64,
    #[serde(flatten)]
    pub entry: RankingEntry,
}

fn member_key(restaurant_id: u64) -> String {
    format!("restaurant:{restaurant_id}")
}

/// Write-through, best-effort ranking over restaurant average scores.
///
/// Every method returns the underlying error so the caller decides how loudly
/// to log it; none of them retries. Failures are counted before being returned.
#[derive(Clone)]
pub struct RankingCache {
    store: Arc<dyn RankingStore>,
    index_key: String,
    top_limit: usize,
}

impl RankingCache {
    pub fn new(store: Arc<dyn RankingStore>, config: &LeaderboardConfig) -> Self {
        Self {
            store,
            index_key: config.key.clone(),
            top_limit: config.top_limit,
        }
    }

    pub fn top_limit(&self) -> usize {
        self.top_limit
    }

    /// Writes the detail blob, then moves the restaurant to `average_score`
    /// in the sorted index. A failure between the two writes leaves a fresh
    /// detail blob under the old position, which the next upsert corrects.
    pub async fn upsert(&self, entry: &RankingEntry) -> Result<(), RankingError> {
        let result = self.write_entry(entry).await;
        if let Err(e) = &result {
            counter!(CACHE_WRITE_FAILURES, "op" => "upsert").increment(1);
            tracing::debug!(
                restaurant_id = entry.restaurant_id,
                error = %e,
                "Ranking cache upsert failed"
            );
        }
        result
    }

    async fn write_entry(&self, entry: &RankingEntry) -> Result<(), RankingError> {
        let member = member_key(entry.restaurant_id);
        let detail = serde_json::to_string(entry)?;
        self.store.put_detail(&member, &detail).await?;
        self.store
            .upsert_score(&self.index_key, &member, entry.average_score)
            .await?;
        tracing::debug!(
            restaurant_id = entry.restaurant_id,
            score = entry.average_score,
            "Ranking cache updated"
        );
        Ok(())
    }

    /// Up to `min(k, top_limit)` entries by descending score, ranked 1..
    /// Index members whose detail blob is missing or unreadable are skipped
    /// and do not consume a rank.
    pub async fn top_k(&self, k: usize) -> Result<Vec<RankedEntry>, RankingError> {
        let limit = k.min(self.top_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let members = self
            .store
            .reverse_range_with_scores(&self.index_key, 0, limit - 1)
            .await
            .inspect_err(|_| counter!(CACHE_READ_FAILURES, "op" => "top_k").increment(1))?;

        let mut ranked = Vec::with_capacity(members.len());
        for (member, _score) in members {
            let detail = self
                .store
                .get_detail(&member)
                .await
                .inspect_err(|_| counter!(CACHE_READ_FAILURES, "op" => "top_k").increment(1))?;

            let Some(detail) = detail else {
                tracing::debug!(member = %member, "Ranked member has no detail blob");
                continue;
            };

            match serde_json::from_str::<RankingEntry>(&detail) {
                Ok(entry) => ranked.push(RankedEntry {
                    rank: ranked.len() as u64 + 1,
                    entry,
                }),
                Err(e) => {
                    tracing::warn!(member = %member, error = %e, "Skipping unreadable detail blob");
                }
            }
        }
        Ok(ranked)
    }

    /// 1-based position in the full descending order, `None` when unranked.
    pub async fn rank_of(&self, restaurant_id: u64) -> Result<Option<u64>, RankingError> {
        let rank = self
            .store
            .reverse_rank(&self.index_key, &member_key(restaurant_id))
            .await
            .inspect_err(|_| counter!(CACHE_READ_FAILURES, "op" => "rank_of").increment(1))?;
        Ok(rank.map(|position| position as u64 + 1))
    }

    /// Drops both the index member and the detail blob.
    pub async fn remove(&self, restaurant_id: u64) -> Result<(), RankingError> {
        let member = member_key(restaurant_id);
        let result = async {
            self.store.remove_member(&self.index_key, &member).await?;
            self.store.delete_detail(&member).await
        }
        .await;

        if let Err(e) = &result {
            counter!(CACHE_WRITE_FAILURES, "op" => "remove").increment(1);
            tracing::debug!(restaurant_id, error = %e, "Ranking cache removal failed");
        }
        result
    }

    pub async fn ping(&self) -> Result<(), RankingError> {
        self.store.ping().await
    }
}
