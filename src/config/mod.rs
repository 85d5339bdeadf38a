mod settings;

pub use settings::{OtelConfig, RedisConfig, ServerConfig, Settings, StatsConfig};
