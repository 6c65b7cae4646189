use crate::store::{RankingError, RankingStore};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const DETAIL_FIELD: &str = "data";

/// Sorted-set and hash backed store. The connection manager reconnects on
/// its own, so a Redis restart surfaces as failed writes rather than a dead
/// handle.
pub struct RedisRankingStore {
    connection: ConnectionManager,
}

impl RedisRankingStore {
    pub async fn connect(url: &str) -> Result<Self, RankingError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        tracing::info!("Connected to ranking store");
        Ok(Self { connection })
    }
}

#[async_trait]
impl RankingStore for RedisRankingStore {
    async fn upsert_score(
        &self,
        index: &str,
        member: &str,
        score: f64,
    ) -> Result<(), RankingError> {
        let mut conn = self.connection.clone();
        let _: () = conn.zadd(index, member, score).await?;
        Ok(())
    }

    async fn reverse_range_with_scores(
        &self,
        index: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(String, f64)>, RankingError> {
        let mut conn = self.connection.clone();
        let members: Vec<(String, f64)> = conn
            .zrevrange_withscores(index, start as isize, stop as isize)
            .await?;
        Ok(members)
    }

    async fn reverse_rank(&self, index: &str, member: &str) -> Result<Option<usize>, RankingError> {
        let mut conn = self.connection.clone();
        let rank: Option<usize> = conn.zrevrank(index, member).await?;
        Ok(rank)
    }

    async fn remove_member(&self, index: &str, member: &str) -> Result<(), RankingError> {
        let mut conn = self.connection.clone();
        let _: () = conn.zrem(index, member).await?;
        Ok(())
    }

    async fn put_detail(&self, key: &str, value: &str) -> Result<(), RankingError> {
        let mut conn = self.connection.clone();
        let _: () = conn.hset(key, DETAIL_FIELD, value).await?;
        Ok(())
    }

    async fn get_detail(&self, key: &str) -> Result<Option<String>, RankingError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.hget(key, DETAIL_FIELD).await?;
        Ok(value)
    }

    async fn delete_detail(&self, key: &str) -> Result<(), RankingError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RankingError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
