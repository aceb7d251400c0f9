//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub generation: GenerationConfig,
    pub history: HistoryConfig,
    pub local: LocalModelConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

/// Caller identity configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Tokens are kept as values: `config` lowercases table keys
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

/// One accepted bearer token and the user it authenticates
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenEntry {
    pub token: String,
    pub user: String,
}

impl AuthConfig {
    /// Token -> user id lookup table
    pub fn token_map(&self) -> HashMap<String, String> {
        self.tokens
            .iter()
            .map(|entry| (entry.token.clone(), entry.user.clone()))
            .collect()
    }
}

fn default_true() -> bool {
    true
}

/// Rate limiting configuration for generation requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    2
}

fn default_burst() -> u32 {
    10
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_media_root")]
    pub media_root: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_media_root() -> String {
    "./media".to_string()
}

fn default_url_prefix() -> String {
    "http://localhost:8000/media".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Generation flow configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generations allowed in flight at once in this process
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Deadline for a single backend call; `None` waits indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_max_concurrent() -> usize {
    1
}

/// History listing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

/// In-process model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalModelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Checkpoint file on disk; required when `enabled`
    #[serde(default)]
    pub model_path: String,
    /// stable-diffusion.cpp compatible executable driving the checkpoint
    #[serde(default = "default_executable")]
    pub executable: String,
}

fn default_executable() -> String {
    "sd".to_string()
}

/// Hosted inference configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    #[serde(default = "default_remote_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_remote_base_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_remote_model() -> String {
    "runwayml/stable-diffusion-v1-5".to_string()
}

fn default_timeout() -> u64 {
    120000
}

/// Relational store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres URL; records are kept in memory when absent
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let use_local_model = std::env::var("USE_LOCAL_MODEL")
            .ok()
            .map(|v| v.trim().eq_ignore_ascii_case("true"));

        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.requests_per_second", default_rps() as i64)?
            .set_default("rate_limit.burst_size", default_burst() as i64)?
            .set_default("storage.media_root", default_media_root())?
            .set_default("storage.url_prefix", default_url_prefix())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("generation.max_concurrent", default_max_concurrent() as i64)?
            .set_default("history.page_size", default_page_size() as i64)?
            .set_default("local.enabled", false)?
            .set_default("remote.base_url", default_remote_base_url())?
            .set_default("remote.model", default_remote_model())?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // IMAGEGEN_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("IMAGEGEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // The unprefixed variables the service has always been deployed with
            .set_override_option("remote.api_key", std::env::var("HUGGING_FACE_API_KEY").ok())?
            .set_override_option("local.enabled", use_local_model)?
            .set_override_option("local.model_path", std::env::var("LOCAL_MODEL_PATH").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.generation.max_concurrent == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "generation.max_concurrent must be at least 1".to_string(),
            )));
        }

        if !self.local.enabled && self.remote.model.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "remote.model cannot be empty when the local model is disabled".to_string(),
            )));
        }

        if self.local.enabled && self.local.model_path.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "local.model_path (LOCAL_MODEL_PATH) must point to a checkpoint when the local model is enabled"
                    .to_string(),
            )));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Invalid logging format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            ))));
        }

        Ok(())
    }

    /// Whether a credential for the hosted backend is present
    pub fn hugging_face_configured(&self) -> bool {
        self.remote
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                cors_origins: default_cors_origins(),
            },
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            storage: StorageConfig {
                media_root: default_media_root(),
                url_prefix: default_url_prefix(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            generation: GenerationConfig {
                max_concurrent: default_max_concurrent(),
                timeout_secs: None,
            },
            history: HistoryConfig {
                page_size: default_page_size(),
            },
            local: LocalModelConfig {
                enabled: false,
                model_path: String::new(),
                executable: default_executable(),
            },
            remote: RemoteConfig {
                api_key: None,
                base_url: default_remote_base_url(),
                model: default_remote_model(),
                timeout_ms: default_timeout(),
            },
            database: DatabaseConfig::default(),
        }
    }
}
