use std::sync::Arc;

use crate::config::settings::ScoringConfig;
use crate::scoring::oracle::MlOracle;

/// Interaction metrics supplied by the client for behavioral analysis.
/// All self-reported and therefore trivially forgeable, which is the point:
/// the WAF under test is supposed to notice implausible values.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionMetrics {
    pub mouse_movements: u64,
    pub keystrokes: u64,
    pub time_on_page_ms: u64,
}

/// Human-likelihood scorer backing `/api/behavioral-analysis`.
///
/// The only inverted pipeline: starts at 1.0 (fully human) and subtracts for
/// each missing humanity signal. The raw score can leave [0, 1] when the ML
/// term pushes it past 1.0; the route layer clamps the reported human score
/// but derives the bot score from the raw value, so that one can go negative.
pub struct BehavioralScorer {
    oracle: Arc<dyn MlOracle>,
    allow_threshold: f64,
    ml_max: f64,
}

impl BehavioralScorer {
    pub fn new(oracle: Arc<dyn MlOracle>, config: &ScoringConfig) -> Self {
        Self {
            oracle,
            allow_threshold: config.behavioral_allow_threshold,
            ml_max: config.behavioral_ml_max,
        }
    }

    pub fn assess(&self, metrics: &InteractionMetrics) -> f64 {
        let mut human_score = 1.0;

        if metrics.mouse_movements < 5 {
            human_score -= 0.3;
        }
        if metrics.keystrokes < 10 {
            human_score -= 0.2;
        }
        if metrics.time_on_page_ms < 2000 {
            human_score -= 0.3;
        }

        human_score += self.oracle.sample() * self.ml_max;

        human_score
    }

    /// `allow` above the threshold, `challenge` otherwise. Strict `>`.
    pub fn recommendation(&self, human_score: f64) -> &'static str {
        if human_score > self.allow_threshold {
            "allow"
        } else {
            "challenge"
        }
    }
}
