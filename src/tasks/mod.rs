//! Background tasks: stats broadcast and history sampling.

mod broadcast;
mod sampler;

pub use broadcast::BroadcastTask;
pub use sampler::SnapshotTask;
