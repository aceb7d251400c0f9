//! Configuration module

pub mod settings;

pub use settings::{
    AuthConfig, DatabaseConfig, GenerationConfig, HistoryConfig, LocalModelConfig,
    LoggingConfig, RateLimitConfig, RemoteConfig, ServerConfig, Settings, StorageConfig,
    TokenEntry,
};
