use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// Handle for a single WebSocket connection.
///
/// A connection is either an anonymous visitor sending heartbeats or a
/// dashboard that joined the broadcast group; the registry does not force
/// one role per connection.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: RwLock<DateTime<Utc>>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: now,
            last_activity: RwLock::new(now),
        }
    }

    pub async fn update_activity(&self) {
        let mut last = self.last_activity.write().await;
        *last = Utc::now();
    }

    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.sender.send(message).await
    }
}

/// Manages all active WebSocket connections and the dashboard broadcast group.
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// connection ids subscribed to the stats broadcast
    dashboards: DashSet<Uuid>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            dashboards: DashSet::new(),
        }
    }

    /// Register a new connection.
    pub fn register(&self, sender: mpsc::Sender<ServerMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::info!(connection_id = %handle.id, "Connection registered");

        handle
    }

    /// Unregister a connection; leaves the broadcast group too.
    pub fn unregister(&self, connection_id: Uuid) {
        self.dashboards.remove(&connection_id);
        if self.connections.remove(&connection_id).is_some() {
            tracing::info!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    /// Join the stats broadcast group.
    ///
    /// Membership only; the subscriber receives the next tick's snapshot,
    /// there is no replay.
    pub fn subscribe(&self, connection_id: Uuid) {
        if self.connections.contains_key(&connection_id) {
            self.dashboards.insert(connection_id);
            tracing::info!(connection_id = %connection_id, "Dashboard subscribed");
        }
    }

    /// Leave the stats broadcast group.
    pub fn unsubscribe(&self, connection_id: Uuid) {
        if self.dashboards.remove(&connection_id).is_some() {
            tracing::info!(connection_id = %connection_id, "Dashboard unsubscribed");
        }
    }

    /// Get all connections currently in the broadcast group.
    pub fn dashboard_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.dashboards
            .iter()
            .filter_map(|id| self.connections.get(&id).map(|h| h.clone()))
            .collect()
    }

    /// Get connection by ID.
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get statistics.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.connections.len(),
            subscribed_dashboards: self.dashboards.len(),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub subscribed_dashboards: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_one(manager: &ConnectionManager) -> Arc<ConnectionHandle> {
        let (tx, _rx) = mpsc::channel(8);
        manager.register(tx)
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let manager = ConnectionManager::new();
        let handle = register_one(&manager);

        assert_eq!(manager.connection_count(), 1);
        assert!(manager.get_connection(handle.id).is_some());

        manager.unregister(handle.id);
        assert_eq!(manager.connection_count(), 0);
        assert!(manager.get_connection(handle.id).is_none());
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let manager = ConnectionManager::new();
        let handle = register_one(&manager);

        manager.subscribe(handle.id);
        assert_eq!(manager.dashboard_connections().len(), 1);
        assert_eq!(manager.stats().subscribed_dashboards, 1);

        manager.unsubscribe(handle.id);
        assert!(manager.dashboard_connections().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_leaves_broadcast_group() {
        let manager = ConnectionManager::new();
        let handle = register_one(&manager);

        manager.subscribe(handle.id);
        manager.unregister(handle.id);
        assert!(manager.dashboard_connections().is_empty());
        assert_eq!(manager.stats().subscribed_dashboards, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_connection_is_ignored() {
        let manager = ConnectionManager::new();
        manager.subscribe(Uuid::new_v4());
        assert!(manager.dashboard_connections().is_empty());
    }
}
