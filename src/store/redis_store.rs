//! Redis store backend.
//!
//! Uses a managed multiplexed connection that reconnects on its own. Write
//! batches become a single pipeline, so one logical action (heartbeat upsert,
//! disconnect cleanup, sampling pass) hits the wire as one round trip and a
//! reader never observes a half-applied heartbeat.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{StatsStore, StoreError, WriteBatch, WriteOp};

/// Redis-backed stats store.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect eagerly; fails when the server is unreachable so startup can
    /// abort with a non-zero exit.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn build_pipeline(batch: WriteBatch) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        for op in batch.into_ops() {
            match op {
                WriteOp::SetWithTtl {
                    key,
                    value,
                    ttl_seconds,
                } => {
                    pipe.set_ex(key, value, ttl_seconds).ignore();
                }
                WriteOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                WriteOp::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
                WriteOp::Expire { key, ttl_seconds } => {
                    pipe.expire(key, ttl_seconds as i64).ignore();
                }
                WriteOp::SeriesAdd { key, score, member } => {
                    pipe.zadd(key, member, score).ignore();
                }
                WriteOp::SeriesTrim { key, min_score } => {
                    // Exclusive upper bound: members at exactly min_score survive
                    pipe.cmd("ZREMRANGEBYSCORE")
                        .arg(key)
                        .arg("-inf")
                        .arg(format!("({min_score}"))
                        .ignore();
                }
            }
        }
        pipe
    }
}

#[async_trait]
impl StatsStore for RedisStore {
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let pipe = Self::build_pipeline(batch);
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_count(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.scard(key).await?;
        Ok(count)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn series_range(
        &self,
        key: &str,
        min_score: i64,
        max_score: i64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrangebyscore(key, min_score, max_score).await?;
        Ok(members)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_command_count() {
        let batch = WriteBatch::new()
            .set_with_ttl("beacon:visitor:a", "{}", 300)
            .set_add("beacon:active", "a")
            .expire("beacon:active", 300)
            .series_trim("beacon:history:1h:total", 0);
        let pipe = RedisStore::build_pipeline(batch);
        assert_eq!(pipe.cmd_iter().count(), 4);
    }
}
