use std::sync::Arc;

use uuid::Uuid;

use crate::store::{keys, StatsStore, StoreError, WriteBatch};

use super::VisitorData;

/// Records and removes visitor sessions in the ephemeral store.
///
/// Owns the session lifecycle: every heartbeat refreshes the TTL on the
/// visitor record, the active set, and the page/device membership sets. The
/// store expires all of them passively, so a session that stops heartbeating
/// simply vanishes.
pub struct PresenceTracker {
    store: Arc<dyn StatsStore>,
    ttl_seconds: u64,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn StatsStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Upsert a visitor session from a heartbeat.
    ///
    /// Idempotent: the same payload only refreshes TTLs. A changed page or
    /// device moves the session into the new bucket; the old membership is
    /// left to expire with its TTL and the aggregator tolerates the overlap.
    #[tracing::instrument(
        name = "presence.heartbeat",
        skip(self, data),
        fields(page_hash = %data.page_hash, device = %data.device_category)
    )]
    pub async fn record_heartbeat(
        &self,
        session_id: Uuid,
        data: &VisitorData,
    ) -> Result<(), StoreError> {
        let session = session_id.to_string();
        let record = serde_json::to_string(data)?;
        let ttl = self.ttl_seconds;

        let page_key = keys::page(&data.page_hash);
        let device_key = keys::device(data.device_category.as_str());

        // One batch per heartbeat: record + active set + page and device
        // membership, all TTL-refreshed together.
        let batch = WriteBatch::new()
            .set_with_ttl(keys::visitor(&session), record, ttl)
            .set_add(keys::ACTIVE, &session)
            .expire(keys::ACTIVE, ttl)
            .set_add(&page_key, &session)
            .expire(&page_key, ttl)
            .set_add(&device_key, &session)
            .expire(&device_key, ttl);

        self.store.apply(batch).await?;

        tracing::debug!(session_id = %session, "Heartbeat recorded");
        Ok(())
    }

    /// Remove a session explicitly.
    ///
    /// Reads the last-known record to find the page/device buckets to leave.
    /// No-op when the record already expired; the visitor key is deleted
    /// either way.
    #[tracing::instrument(name = "presence.disconnect", skip(self))]
    pub async fn record_disconnect(&self, session_id: Uuid) -> Result<(), StoreError> {
        let session = session_id.to_string();
        let visitor_key = keys::visitor(&session);

        let mut batch = WriteBatch::new();

        if let Some(raw) = self.store.get(&visitor_key).await? {
            match serde_json::from_str::<VisitorData>(&raw) {
                Ok(data) => {
                    batch = batch
                        .set_remove(keys::ACTIVE, &session)
                        .set_remove(keys::page(&data.page_hash), &session)
                        .set_remove(keys::device(data.device_category.as_str()), &session);
                }
                Err(e) => {
                    // Unreadable record: still drop the active membership
                    tracing::warn!(session_id = %session, error = %e, "Corrupt visitor record");
                    batch = batch.set_remove(keys::ACTIVE, &session);
                }
            }
        }

        batch = batch.delete(visitor_key);
        self.store.apply(batch).await?;

        tracing::debug!(session_id = %session, "Session removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::DeviceCategory;
    use crate::store::MemoryStore;

    fn visitor(page: &str, device: DeviceCategory) -> VisitorData {
        VisitorData {
            page_hash: page.to_string(),
            device_category: device,
            screen_bucket: "1920x1080".to_string(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_heartbeat_populates_all_sets() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PresenceTracker::new(store.clone(), 300);
        let session = Uuid::new_v4();

        tracker
            .record_heartbeat(session, &visitor("P1", DeviceCategory::Desktop))
            .await
            .unwrap();

        assert_eq!(store.set_count(keys::ACTIVE).await.unwrap(), 1);
        assert_eq!(store.set_count(&keys::page("P1")).await.unwrap(), 1);
        assert_eq!(store.set_count(&keys::device("desktop")).await.unwrap(), 1);
        assert!(store
            .get(&keys::visitor(&session.to_string()))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_repeated_heartbeats_are_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PresenceTracker::new(store.clone(), 300);
        let session = Uuid::new_v4();
        let data = visitor("P1", DeviceCategory::Mobile);

        for _ in 0..5 {
            tracker.record_heartbeat(session, &data).await.unwrap();
        }

        assert_eq!(store.set_count(keys::ACTIVE).await.unwrap(), 1);
        assert_eq!(store.set_count(&keys::page("P1")).await.unwrap(), 1);
        assert_eq!(store.set_count(&keys::device("mobile")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_removes_membership_and_record() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PresenceTracker::new(store.clone(), 300);
        let session = Uuid::new_v4();

        tracker
            .record_heartbeat(session, &visitor("P1", DeviceCategory::Tablet))
            .await
            .unwrap();
        tracker.record_disconnect(session).await.unwrap();

        assert_eq!(store.set_count(keys::ACTIVE).await.unwrap(), 0);
        assert_eq!(store.set_count(&keys::page("P1")).await.unwrap(), 0);
        assert_eq!(store.set_count(&keys::device("tablet")).await.unwrap(), 0);
        assert!(store
            .get(&keys::visitor(&session.to_string()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_disconnect_of_unknown_session_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PresenceTracker::new(store, 300);

        tracker.record_disconnect(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_device_change_keeps_stale_bucket_until_ttl() {
        let store = Arc::new(MemoryStore::new());
        let tracker = PresenceTracker::new(store.clone(), 300);
        let session = Uuid::new_v4();

        tracker
            .record_heartbeat(session, &visitor("P1", DeviceCategory::Desktop))
            .await
            .unwrap();
        tracker
            .record_heartbeat(session, &visitor("P1", DeviceCategory::Mobile))
            .await
            .unwrap();

        // Known transient double-count: the old bucket is not eagerly removed
        assert_eq!(store.set_count(&keys::device("desktop")).await.unwrap(), 1);
        assert_eq!(store.set_count(&keys::device("mobile")).await.unwrap(), 1);
        assert_eq!(store.set_count(keys::ACTIVE).await.unwrap(), 1);
    }
}
