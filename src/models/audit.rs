use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row per login call, whatever the outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttempt {
    pub username: String,
    pub ip: String,
    pub user_agent: String,
    pub device_fingerprint: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub ip: String,
    pub device_fingerprint: String,
    pub timestamp: DateTime<Utc>,
    pub fraud_score: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotActivityRecord {
    pub ip: String,
    pub user_agent: String,
    pub request_pattern: String,
    pub bot_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Count and average score for one audit table.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub total: u64,
    pub average_score: f64,
}

/// Aggregates across the three audit tables, served by `/api/analytics`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub login_attempts: TableStats,
    pub transactions: TableStats,
    pub bot_activity: TableStats,
}
