use std::sync::Arc;

use tracing::debug;

use crate::config::settings::ScoringConfig;
use crate::scoring::oracle::MlOracle;

/// Bot scorer backing `/api/bot-challenge`.
///
/// Stateless: everything it needs is in the request headers. Automation
/// keywords in the user agent stack (a self-described "bot crawler spider"
/// collects all three weights).
pub struct BotScorer {
    oracle: Arc<dyn MlOracle>,
    ml_max: f64,
}

impl BotScorer {
    pub fn new(oracle: Arc<dyn MlOracle>, config: &ScoringConfig) -> Self {
        Self {
            oracle,
            ml_max: config.bot_ml_max,
        }
    }

    pub fn assess(&self, user_agent: &str, accept: &str) -> f64 {
        let mut score = 0.0;

        if user_agent.is_empty() || user_agent.len() < 10 {
            score += 0.4;
        }
        let ua = user_agent.to_lowercase();
        if ua.contains("bot") {
            score += 0.5;
        }
        if ua.contains("crawler") {
            score += 0.5;
        }
        if ua.contains("spider") {
            score += 0.5;
        }

        // Browsers advertise text/html; API clients and crawlers rarely do.
        if !accept.contains("text/html") {
            score += 0.2;
        }

        score += self.oracle.sample() * self.ml_max;

        debug!(user_agent = user_agent, score = score, "bot score assessed");
        score
    }
}
