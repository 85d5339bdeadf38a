//! Visitor presence tracking.
//!
//! Sessions are ephemeral: a visitor exists only while its heartbeats keep
//! the store keys alive. No identity is recorded beyond the server-scoped
//! connection id.

mod tracker;
mod types;

pub use tracker::PresenceTracker;
pub use types::{DeviceCategory, VisitorData};
