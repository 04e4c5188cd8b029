use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::config::settings::ScoringConfig;
use crate::scoring::oracle::MlOracle;
use crate::storage::Store;

/// Fraud scorer backing `/api/transaction`.
///
/// Amount tiers, same-IP-or-device velocity over the last hour, plus two
/// simulated model terms (an "ML" component and a "geographic" component,
/// both uniform random).
pub struct TransactionFraudScorer {
    store: Arc<dyn Store>,
    oracle: Arc<dyn MlOracle>,
    history_window: Duration,
    count_limit: u64,
    total_limit: f64,
    ml_max: f64,
    geo_max: f64,
}

impl TransactionFraudScorer {
    pub fn new(store: Arc<dyn Store>, oracle: Arc<dyn MlOracle>, config: &ScoringConfig) -> Self {
        Self {
            store,
            oracle,
            history_window: Duration::from_secs(config.transaction_history_window_secs),
            count_limit: config.transaction_count_limit,
            total_limit: config.transaction_total_limit,
            ml_max: config.transaction_ml_max,
            geo_max: config.transaction_geo_max,
        }
    }

    pub fn assess(&self, amount: f64, ip: &str, fingerprint: &str) -> Result<f64> {
        let mut score = 0.0;

        if amount > 1000.0 {
            score += 0.2;
        }
        if amount > 5000.0 {
            score += 0.3;
        }

        let velocity = self
            .store
            .transaction_velocity(ip, fingerprint, self.history_window)?;
        if velocity.count > self.count_limit {
            score += 0.3;
        }
        if velocity.total_amount > self.total_limit {
            score += 0.4;
        }

        score += self.oracle.sample() * self.ml_max;
        score += self.oracle.sample() * self.geo_max;

        debug!(
            ip = ip,
            amount = amount,
            recent_count = velocity.count,
            recent_total = velocity.total_amount,
            score = score,
            "transaction fraud assessed"
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::default_scoring_config;
    use crate::models::audit::TransactionRecord;
    use crate::scoring::oracle::FixedOracle;
    use crate::storage::memory::MemoryStore;
    use chrono::Utc;

    fn scorer_with(store: Arc<MemoryStore>) -> TransactionFraudScorer {
        TransactionFraudScorer::new(
            store,
            Arc::new(FixedOracle(0.0)),
            &default_scoring_config(),
        )
    }

    fn record(amount: f64, ip: &str, fingerprint: &str) -> TransactionRecord {
        TransactionRecord {
            user_id: 1,
            amount,
            currency: "USD".to_string(),
            merchant: "shop".to_string(),
            ip: ip.to_string(),
            device_fingerprint: fingerprint.to_string(),
            timestamp: Utc::now(),
            fraud_score: 0.0,
            status: "approved".to_string(),
        }
    }

    #[test]
    fn test_amount_tiers() {
        let store = Arc::new(MemoryStore::new());
        store.seed().unwrap();
        let scorer = scorer_with(store);

        assert_eq!(scorer.assess(500.0, "10.0.0.1", "fp").unwrap(), 0.0);
        assert!((scorer.assess(2000.0, "10.0.0.1", "fp").unwrap() - 0.2).abs() < 1e-9);
        // Both amount weights stack above 5000.
        assert!((scorer.assess(6000.0, "10.0.0.1", "fp").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_by_count() {
        let store = Arc::new(MemoryStore::new());
        store.seed().unwrap();
        for _ in 0..6 {
            store.insert_transaction(&record(10.0, "10.0.0.1", "fp")).unwrap();
        }
        let scorer = scorer_with(store);
        let score = scorer.assess(500.0, "10.0.0.1", "other-fp").unwrap();
        assert!((score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_by_total_amount_via_fingerprint() {
        let store = Arc::new(MemoryStore::new());
        store.seed().unwrap();
        store.insert_transaction(&record(6000.0, "10.0.0.1", "fp")).unwrap();
        store.insert_transaction(&record(6000.0, "10.0.0.2", "fp")).unwrap();

        let scorer = scorer_with(store);
        // New IP, same device fingerprint: the 12k total still counts.
        let score = scorer.assess(500.0, "10.0.0.3", "fp").unwrap();
        assert!((score - 0.4).abs() < 1e-9);
    }
}
