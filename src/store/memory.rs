//! In-memory store backend using DashMap.
//!
//! Used by the test suite and store-less deployments. Expiry is checked
//! lazily on read, which matches the passive-expiry behavior of the Redis
//! backend: a key can vanish between any two reads.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{StatsStore, StoreError, WriteBatch, WriteOp};

#[derive(Debug, Clone)]
struct ValueEntry {
    value: String,
    expires_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Default)]
struct SetEntry {
    members: HashSet<String>,
    expires_at_ms: Option<i64>,
}

/// In-memory stats store.
pub struct MemoryStore {
    values: DashMap<String, ValueEntry>,
    sets: DashMap<String, SetEntry>,
    series: DashMap<String, Vec<(i64, String)>>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn is_live(expires_at_ms: Option<i64>) -> bool {
    expires_at_ms.map_or(true, |t| t > now_ms())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            sets: DashMap::new(),
            series: DashMap::new(),
        }
    }

    fn apply_op(&self, op: WriteOp) {
        match op {
            WriteOp::SetWithTtl {
                key,
                value,
                ttl_seconds,
            } => {
                self.values.insert(
                    key,
                    ValueEntry {
                        value,
                        expires_at_ms: Some(now_ms() + ttl_seconds as i64 * 1000),
                    },
                );
            }
            WriteOp::SetAdd { key, member } => {
                let mut entry = self.sets.entry(key).or_default();
                if !is_live(entry.expires_at_ms) {
                    // Expired set, start fresh
                    entry.members.clear();
                    entry.expires_at_ms = None;
                }
                entry.members.insert(member);
            }
            WriteOp::SetRemove { key, member } => {
                if let Some(mut entry) = self.sets.get_mut(&key) {
                    entry.members.remove(&member);
                    if entry.members.is_empty() {
                        drop(entry);
                        self.sets.remove(&key);
                    }
                }
            }
            WriteOp::Delete { key } => {
                self.values.remove(&key);
                self.sets.remove(&key);
                self.series.remove(&key);
            }
            WriteOp::Expire { key, ttl_seconds } => {
                let expires_at_ms = Some(now_ms() + ttl_seconds as i64 * 1000);
                if let Some(mut entry) = self.values.get_mut(&key) {
                    entry.expires_at_ms = expires_at_ms;
                }
                if let Some(mut entry) = self.sets.get_mut(&key) {
                    entry.expires_at_ms = expires_at_ms;
                }
            }
            WriteOp::SeriesAdd { key, score, member } => {
                let mut series = self.series.entry(key).or_default();
                let pos = series.partition_point(|(s, _)| *s <= score);
                series.insert(pos, (score, member));
            }
            WriteOp::SeriesTrim { key, min_score } => {
                if let Some(mut series) = self.series.get_mut(&key) {
                    series.retain(|(s, _)| *s >= min_score);
                }
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        for op in batch.into_ops() {
            self.apply_op(op);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let expired = match self.values.get(key) {
            Some(entry) if is_live(entry.expires_at_ms) => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove(key);
        }
        Ok(None)
    }

    async fn set_count(&self, key: &str) -> Result<u64, StoreError> {
        let expired = match self.sets.get(key) {
            Some(entry) if is_live(entry.expires_at_ms) => {
                return Ok(entry.members.len() as u64);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sets.remove(key);
        }
        Ok(0)
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in self.sets.iter() {
            if entry.key().starts_with(prefix) && is_live(entry.expires_at_ms) {
                keys.push(entry.key().clone());
            }
        }
        for entry in self.values.iter() {
            if entry.key().starts_with(prefix) && is_live(entry.expires_at_ms) {
                keys.push(entry.key().clone());
            }
        }
        Ok(keys)
    }

    async fn series_range(
        &self,
        key: &str,
        min_score: i64,
        max_score: i64,
    ) -> Result<Vec<String>, StoreError> {
        let members = self
            .series
            .get(key)
            .map(|series| {
                series
                    .iter()
                    .filter(|(s, _)| *s >= min_score && *s <= max_score)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(members)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_membership_and_count() {
        let store = MemoryStore::new();
        let batch = WriteBatch::new()
            .set_add("s", "a")
            .set_add("s", "b")
            .set_add("s", "a")
            .expire("s", 300);
        store.apply(batch).await.unwrap();

        assert_eq!(store.set_count("s").await.unwrap(), 2);

        store
            .apply(WriteBatch::new().set_remove("s", "a"))
            .await
            .unwrap();
        assert_eq!(store.set_count("s").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_removing_last_member_drops_the_set() {
        let store = MemoryStore::new();
        store
            .apply(WriteBatch::new().set_add("s", "a"))
            .await
            .unwrap();
        store
            .apply(WriteBatch::new().set_remove("s", "a"))
            .await
            .unwrap();

        assert_eq!(store.set_count("s").await.unwrap(), 0);
        assert!(store.scan_keys("s").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store
            .apply(WriteBatch::new().set_with_ttl("k", "v", 0))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_series_range_and_trim() {
        let store = MemoryStore::new();
        let batch = WriteBatch::new()
            .series_add("h", 10, "p10")
            .series_add("h", 20, "p20")
            .series_add("h", 30, "p30");
        store.apply(batch).await.unwrap();

        let points = store.series_range("h", 15, 30).await.unwrap();
        assert_eq!(points, vec!["p20".to_string(), "p30".to_string()]);

        store
            .apply(WriteBatch::new().series_trim("h", 25))
            .await
            .unwrap();
        let points = store.series_range("h", 0, 100).await.unwrap();
        assert_eq!(points, vec!["p30".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_keys_by_prefix() {
        let store = MemoryStore::new();
        let batch = WriteBatch::new()
            .set_add("beacon:page:a", "s1")
            .set_add("beacon:page:b", "s1")
            .set_add("beacon:device:mobile", "s1");
        store.apply(batch).await.unwrap();

        let mut keys = store.scan_keys("beacon:page:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["beacon:page:a", "beacon:page:b"]);
    }
}
