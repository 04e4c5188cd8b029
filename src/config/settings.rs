use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use tracing::warn;

use super::defaults;

/// Top-level configuration for the lurebox demo target.
/// Deserializes from a TOML configuration file; every field has a default so
/// the demo runs with no config at all.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "defaults::default_server_config")]
    pub server: ServerConfig,

    #[serde(default = "defaults::default_storage_config")]
    pub storage: StorageConfig,

    #[serde(default = "defaults::default_scoring_config")]
    pub scoring: ScoringConfig,

    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(settings)
    }

    /// Load configuration, falling back to defaults when the file is absent
    /// or unreadable. A parse error of an existing file is still surfaced.
    pub fn load_or_default(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let settings: Settings = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path))?;
                Ok(settings)
            }
            Err(e) => {
                warn!("Config file {} not readable ({}), using defaults", path, e);
                Ok(Settings::default())
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: defaults::default_server_config(),
            storage: defaults::default_storage_config(),
            scoring: defaults::default_scoring_config(),
            logging: defaults::default_logging_config(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::default_bind")]
    pub bind: String,

    #[serde(default = "defaults::default_port")]
    pub port: u16,

    /// Fixed artificial delay before `/login` responds, so repeated failed
    /// attempts stand out to an external brute-force detector.
    #[serde(default = "defaults::default_login_delay_ms")]
    pub login_delay_ms: u64,
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `memory` (canned injection responses) or `sqlite` (genuinely
    /// injectable concatenated SQL against an embedded engine).
    #[serde(default = "defaults::default_backend")]
    pub backend: String,

    /// Path for the sqlite backend. `:memory:` keeps the demo's contract of
    /// losing everything on restart.
    #[serde(default = "defaults::default_sqlite_path")]
    pub sqlite_path: String,
}

/// Weights, thresholds and history windows for the scoring pipelines.
/// Tier comparisons are
/// strict `>` everywhere.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "defaults::default_login_challenge_threshold")]
    pub login_challenge_threshold: f64,

    #[serde(default = "defaults::default_login_block_threshold")]
    pub login_block_threshold: f64,

    #[serde(default = "defaults::default_login_history_window_secs")]
    pub login_history_window_secs: u64,

    #[serde(default = "defaults::default_login_attempt_limit")]
    pub login_attempt_limit: u64,

    #[serde(default = "defaults::default_login_ml_max")]
    pub login_ml_max: f64,

    #[serde(default = "defaults::default_transaction_challenge_threshold")]
    pub transaction_challenge_threshold: f64,

    #[serde(default = "defaults::default_transaction_block_threshold")]
    pub transaction_block_threshold: f64,

    #[serde(default = "defaults::default_transaction_history_window_secs")]
    pub transaction_history_window_secs: u64,

    #[serde(default = "defaults::default_transaction_count_limit")]
    pub transaction_count_limit: u64,

    #[serde(default = "defaults::default_transaction_total_limit")]
    pub transaction_total_limit: f64,

    #[serde(default = "defaults::default_transaction_ml_max")]
    pub transaction_ml_max: f64,

    #[serde(default = "defaults::default_transaction_geo_max")]
    pub transaction_geo_max: f64,

    #[serde(default = "defaults::default_bot_challenge_threshold")]
    pub bot_challenge_threshold: f64,

    #[serde(default = "defaults::default_bot_block_threshold")]
    pub bot_block_threshold: f64,

    #[serde(default = "defaults::default_bot_ml_max")]
    pub bot_ml_max: f64,

    #[serde(default = "defaults::default_behavioral_allow_threshold")]
    pub behavioral_allow_threshold: f64,

    #[serde(default = "defaults::default_behavioral_ml_max")]
    pub behavioral_ml_max: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
}
