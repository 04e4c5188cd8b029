use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::config::settings::ScoringConfig;
use crate::scoring::oracle::MlOracle;
use crate::storage::Store;

/// Login risk scorer backing `/api/login-attempt`.
///
/// Accumulates fixed weights for suspicious user agents, weak or stuffed
/// passwords, and recent attempt velocity from the same IP, then adds the
/// simulated ML term. Weights are additive and unbounded; the tier
/// thresholds do the bounding.
pub struct LoginRiskScorer {
    store: Arc<dyn Store>,
    oracle: Arc<dyn MlOracle>,
    history_window: Duration,
    attempt_limit: u64,
    ml_max: f64,
}

impl LoginRiskScorer {
    pub fn new(store: Arc<dyn Store>, oracle: Arc<dyn MlOracle>, config: &ScoringConfig) -> Self {
        Self {
            store,
            oracle,
            history_window: Duration::from_secs(config.login_history_window_secs),
            attempt_limit: config.login_attempt_limit,
            ml_max: config.login_ml_max,
        }
    }

    /// Score one login call. The history query runs synchronously, so the
    /// velocity weight is always reflected in the returned score.
    pub fn assess(&self, password: &str, ip: &str, user_agent: &str) -> Result<f64> {
        let mut score = 0.0;

        let ua = user_agent.to_lowercase();
        if ua.contains("bot") || ua.contains("crawler") {
            score += 0.3;
        }

        let recent = self.store.login_attempts_since(ip, self.history_window)?;
        if recent > self.attempt_limit {
            score += 0.4;
        }

        // Credential-stuffing heuristics: short or top-of-wordlist passwords.
        if !password.is_empty()
            && (password.len() < 6 || password == "password" || password == "123456")
        {
            score += 0.2;
        }

        score += self.oracle.sample() * self.ml_max;

        debug!(ip = ip, recent_attempts = recent, score = score, "login risk assessed");
        Ok(score)
    }
}
