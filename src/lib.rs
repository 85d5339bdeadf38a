// Infrastructure layer (shared components)
pub mod anonymize;
pub mod config;
pub mod error;
pub mod metrics;
pub mod store;

// Domain layer (presence & aggregation engine)
pub mod connection_manager;
pub mod history;
pub mod presence;
pub mod stats;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;

// Supporting modules
pub mod tasks;
pub mod telemetry;
