mod settings;

pub use settings::{
    DatabaseConfig, EmailConfig, MetricsConfig, OtelConfig, QueueConfig, RedisConfig,
    ServerConfig, Settings, ValidationConfig, WorkerConfig,
};
