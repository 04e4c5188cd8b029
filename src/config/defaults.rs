use super::settings::{LoggingConfig, ScoringConfig, ServerConfig, StorageConfig};

// ---------------------------------------------------------------------------
// Top-level struct defaults
// ---------------------------------------------------------------------------

pub fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind: default_bind(),
        port: default_port(),
        login_delay_ms: default_login_delay_ms(),
    }
}

pub fn default_storage_config() -> StorageConfig {
    StorageConfig {
        backend: default_backend(),
        sqlite_path: default_sqlite_path(),
    }
}

pub fn default_scoring_config() -> ScoringConfig {
    ScoringConfig {
        login_challenge_threshold: default_login_challenge_threshold(),
        login_block_threshold: default_login_block_threshold(),
        login_history_window_secs: default_login_history_window_secs(),
        login_attempt_limit: default_login_attempt_limit(),
        login_ml_max: default_login_ml_max(),
        transaction_challenge_threshold: default_transaction_challenge_threshold(),
        transaction_block_threshold: default_transaction_block_threshold(),
        transaction_history_window_secs: default_transaction_history_window_secs(),
        transaction_count_limit: default_transaction_count_limit(),
        transaction_total_limit: default_transaction_total_limit(),
        transaction_ml_max: default_transaction_ml_max(),
        transaction_geo_max: default_transaction_geo_max(),
        bot_challenge_threshold: default_bot_challenge_threshold(),
        bot_block_threshold: default_bot_block_threshold(),
        bot_ml_max: default_bot_ml_max(),
        behavioral_allow_threshold: default_behavioral_allow_threshold(),
        behavioral_ml_max: default_behavioral_ml_max(),
    }
}

pub fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    3000
}

pub fn default_login_delay_ms() -> u64 {
    100
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub fn default_backend() -> String {
    "memory".to_string()
}

pub fn default_sqlite_path() -> String {
    ":memory:".to_string()
}

// ---------------------------------------------------------------------------
// Scoring weights and thresholds
// ---------------------------------------------------------------------------

pub fn default_login_challenge_threshold() -> f64 {
    0.4
}

pub fn default_login_block_threshold() -> f64 {
    0.7
}

pub fn default_login_history_window_secs() -> u64 {
    300
}

pub fn default_login_attempt_limit() -> u64 {
    5
}

pub fn default_login_ml_max() -> f64 {
    0.3
}

pub fn default_transaction_challenge_threshold() -> f64 {
    0.5
}

pub fn default_transaction_block_threshold() -> f64 {
    0.8
}

pub fn default_transaction_history_window_secs() -> u64 {
    3600
}

pub fn default_transaction_count_limit() -> u64 {
    5
}

pub fn default_transaction_total_limit() -> f64 {
    10_000.0
}

pub fn default_transaction_ml_max() -> f64 {
    0.4
}

pub fn default_transaction_geo_max() -> f64 {
    0.2
}

pub fn default_bot_challenge_threshold() -> f64 {
    0.4
}

pub fn default_bot_block_threshold() -> f64 {
    0.7
}

pub fn default_bot_ml_max() -> f64 {
    0.3
}

pub fn default_behavioral_allow_threshold() -> f64 {
    0.6
}

pub fn default_behavioral_ml_max() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

pub fn default_log_level() -> String {
    "info".to_string()
}
