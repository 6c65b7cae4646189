use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
pub enum RankingError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("ranking store unavailable: {0}")]
    Unavailable(String),
}

/// External store offering a sorted numeric index plus a key-value detail
/// store. Semantics follow Redis sorted sets: members are unique per index,
/// re-adding a member moves it, and reverse order breaks score ties by
/// member in descending lexicographic order.
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Inserts `member` into `index` or moves it to `score`.
    async fn upsert_score(&self, index: &str, member: &str, score: f64)
    -> Result<(), RankingError>;

    /// Members ranked `start..=stop` (zero-based) in descending score order.
    async fn reverse_range_with_scores(
        &self,
        index: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, RankingError>;

    /// Zero-based position of `member` in descending score order.
    async fn reverse_rank(&self, index: &str, member: &str) -> Result<Option<usize>, RankingError>;

    async fn remove_member(&self, index: &str, member: &str) -> Result<(), RankingError>;

    async fn put_detail(&self, key: &str, value: &str) -> Result<(), RankingError>;

    async fn get_detail(&self, key: &str) -> Result<Option<String>, RankingError>;

    async fn delete_detail(&self, key: &str) -> Result<(), RankingError>;

    /// Round-trip to the store, for health reporting.
    async fn ping(&self) -> Result<(), RankingError>;
}

/// In-process store for local runs and tests. Ordering matches the Redis
/// backend so results are interchangeable.
#[derive(Default)]
pub struct InMemoryRankingStore {
    indexes: RwLock<HashMap<String, HashMap<String, f64>>>,
    details: RwLock<HashMap<String, String>>,
}

impl InMemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_desc(&self, index: &str) -> Vec<(String, f64)> {
        let indexes = self.indexes.read();
        let mut members: Vec<(String, f64)> = indexes
            .get(index)
            .map(|members| members.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();

        members.sort_by(|(a_member, a_score), (b_member, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_member.cmp(a_member))
        });
        members
    }
}

#[async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn upsert_score(
        &self,
        index: &str,
        member: &str,
        score: f64,
    ) -> Result<(), RankingError> {
        self.indexes
            .write()
            .entry(index.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn reverse_range_with_scores(
        &self,
        index: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, RankingError> {
        if stop < start {
            return Ok(Vec::new());
        }
        Ok(self
            .sorted_desc(index)
            .into_iter()
            .skip(start)
            .take(stop - start + 1)
            .collect())
    }

    async fn reverse_rank(&self, index: &str, member: &str) -> Result<Option<usize>, RankingError> {
        Ok(self
            .sorted_desc(index)
            .iter()
            .position(|(candidate, _)| candidate == member))
    }

    async fn remove_member(&self, index: &str, member: &str) -> Result<(), RankingError> {
        if let Some(members) = self.indexes.write().get_mut(index) {
            members.remove(member);
        }
        Ok(())
    }

    async fn put_detail(&self, key: &str, value: &str) -> Result<(), RankingError> {
        self.details
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_detail(&self, key: &str) -> Result<Option<String>, RankingError> {
        Ok(self.details.read().get(key).cloned())
    }

    async fn delete_detail(&self, key: &str) -> Result<(), RankingError> {
        self.details.write().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), RankingError> {
        Ok(())
    }
}
