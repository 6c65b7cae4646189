use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("top_limit must be greater than 0")]
    ZeroTopLimit,

    #[error("leaderboard key cannot be empty")]
    EmptyKey,

    #[error("redis url cannot be empty")]
    EmptyRedisUrl,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum RankingStoreType {
    Redis { url: String },
    Memory,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct LeaderboardConfig {
    /// Name of the sorted index holding every restaurant's score
    #[serde(default = "default_key")]
    pub key: String,
    /// Upper bound on how many entries a single top-K query may return
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,
    pub store: RankingStoreType,
}

fn default_key() -> String {
    "restaurant_leaderboard".into()
}

fn default_top_limit() -> usize {
    50
}

impl LeaderboardConfig {
    pub fn new(store: RankingStoreType) -> Self {
        LeaderboardConfig {
            key: default_key(),
            top_limit: default_top_limit(),
            store,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.top_limit == 0 {
            return Err(ValidationError::ZeroTopLimit);
        }
        if self.key.trim().is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        if let RankingStoreType::Redis { url } = &self.store
            && url.trim().is_empty()
        {
            return Err(ValidationError::EmptyRedisUrl);
        }
        Ok(())
    }
}
