//! WebSocket connection registry and broadcast group membership.

mod registry;

pub use registry::{ConnectionHandle, ConnectionManager, ConnectionStats};
