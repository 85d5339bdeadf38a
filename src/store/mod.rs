//! Ephemeral key-value store boundary.
//!
//! Presence and history data live in a TTL-bounded store. The store is the
//! source of truth for presence: expired keys silently vanish, so every read
//! is best-effort and callers must tolerate partial state.

mod memory;
mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{RedisConfig, StatsConfig};

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown store backend requested in configuration
    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),
}

/// A single write against the store.
///
/// Writes are grouped into a [`WriteBatch`] so one logical action (a heartbeat
/// upsert, a disconnect cleanup, a sampling pass) is applied as a unit -- a
/// single pipeline on the Redis backend.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Set a string value with a TTL in seconds
    SetWithTtl {
        key: String,
        value: String,
        ttl_seconds: u64,
    },
    /// Add a member to a set
    SetAdd { key: String, member: String },
    /// Remove a member from a set
    SetRemove { key: String, member: String },
    /// Delete a key outright
    Delete { key: String },
    /// Refresh the TTL of an existing key
    Expire { key: String, ttl_seconds: u64 },
    /// Append a member to a score-ordered series
    SeriesAdd {
        key: String,
        score: i64,
        member: String,
    },
    /// Drop all series members with score below `min_score`
    SeriesTrim { key: String, min_score: i64 },
}

/// An ordered batch of writes applied as one unit.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_with_ttl(mut self, key: impl Into<String>, value: impl Into<String>, ttl_seconds: u64) -> Self {
        self.ops.push(WriteOp::SetWithTtl {
            key: key.into(),
            value: value.into(),
            ttl_seconds,
        });
        self
    }

    pub fn set_add(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(WriteOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(WriteOp::SetRemove {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl_seconds: u64) -> Self {
        self.ops.push(WriteOp::Expire {
            key: key.into(),
            ttl_seconds,
        });
        self
    }

    pub fn series_add(mut self, key: impl Into<String>, score: i64, member: impl Into<String>) -> Self {
        self.ops.push(WriteOp::SeriesAdd {
            key: key.into(),
            score,
            member: member.into(),
        });
        self
    }

    pub fn series_trim(mut self, key: impl Into<String>, min_score: i64) -> Self {
        self.ops.push(WriteOp::SeriesTrim {
            key: key.into(),
            min_score,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Ephemeral store used for presence sets and history series.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Apply a batch of writes as one unit.
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Read a string value, None when missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Cardinality of a set, 0 when missing or expired.
    async fn set_count(&self, key: &str) -> Result<u64, StoreError>;

    /// All live keys starting with `prefix`.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Series members with score in `[min_score, max_score]`, score order.
    async fn series_range(
        &self,
        key: &str,
        min_score: i64,
        max_score: i64,
    ) -> Result<Vec<String>, StoreError>;

    /// Connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for health reporting.
    fn backend_name(&self) -> &'static str;
}

/// Store key layout.
///
/// Mirrors the Redis namespace: visitor records, the active set, per-page and
/// per-device membership sets, and score-ordered history series.
pub mod keys {
    /// Set of currently active session ids
    pub const ACTIVE: &str = "beacon:active";
    /// Prefix for per-page membership sets
    pub const PAGE_PREFIX: &str = "beacon:page:";
    /// Prefix for per-visitor session records
    pub const VISITOR_PREFIX: &str = "beacon:visitor:";
    /// Prefix for per-device-category membership sets
    pub const DEVICE_PREFIX: &str = "beacon:device:";

    pub fn visitor(session_id: &str) -> String {
        format!("{VISITOR_PREFIX}{session_id}")
    }

    pub fn page(page_hash: &str) -> String {
        format!("{PAGE_PREFIX}{page_hash}")
    }

    pub fn device(category: &str) -> String {
        format!("{DEVICE_PREFIX}{category}")
    }

    pub fn history(range: &str, metric: &str) -> String {
        format!("beacon:history:{range}:{metric}")
    }

    pub fn history_page(range: &str, page_hash: &str) -> String {
        format!("beacon:history:{range}:page:{page_hash}")
    }
}

/// Create a store backend from configuration.
///
/// `redis` (default) connects eagerly and fails fast when the server is
/// unreachable; `memory` is for tests and store-less deployments.
pub async fn create_store(
    redis: &RedisConfig,
    stats: &StatsConfig,
) -> Result<Arc<dyn StatsStore>, StoreError> {
    match stats.backend.as_str() {
        "memory" => {
            tracing::info!("Using in-memory stats store");
            Ok(Arc::new(MemoryStore::new()))
        }
        "redis" => {
            let store = RedisStore::connect(&redis.url).await?;
            tracing::info!(url = %redis.url, "Connected to Redis stats store");
            Ok(Arc::new(store))
        }
        other => Err(StoreError::UnknownBackend(other.to_string())),
    }
}
