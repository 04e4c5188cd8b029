use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;

use crate::models::audit::{
    AuditSummary, BotActivityRecord, LoginAttempt, TableStats, TransactionRecord,
};
use crate::models::catalog::{Comment, Product, PublicUser, User};

use super::{
    has_destructive_keywords, has_quote_or_bypass, seed_products, seed_users, SearchOutcome,
    Store, TransactionVelocity, UserListOutcome,
};

/// In-memory backend: plain vectors behind `parking_lot` locks.
///
/// This variant never executes SQL. Injection payloads are recognised by
/// substring matching and answered with canned breach outcomes, so an
/// attacker sees a convincing "compromise" while the data stays intact.
/// Reference tables are written once by `seed` and only read afterwards;
/// audit vectors are append-only.
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    products: RwLock<Vec<Product>>,
    comments: RwLock<Vec<Comment>>,
    login_attempts: RwLock<Vec<LoginAttempt>>,
    transactions: RwLock<Vec<TransactionRecord>>,
    bot_activity: RwLock<Vec<BotActivityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            products: RwLock::new(Vec::new()),
            comments: RwLock::new(Vec::new()),
            login_attempts: RwLock::new(Vec::new()),
            transactions: RwLock::new(Vec::new()),
            bot_activity: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn stats_for<T>(rows: &[T], score: impl Fn(&T) -> f64) -> TableStats {
    let total = rows.len() as u64;
    let average_score = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(&score).sum::<f64>() / rows.len() as f64
    };
    TableStats {
        total,
        average_score,
    }
}

impl Store for MemoryStore {
    fn seed(&self) -> Result<()> {
        *self.users.write() = seed_users();
        *self.products.write() = seed_products();
        self.comments.write().clear();
        self.login_attempts.write().clear();
        self.transactions.write().clear();
        self.bot_activity.write().clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().clone())
    }

    fn search_products(&self, query: &str) -> Result<SearchOutcome> {
        if has_destructive_keywords(query) {
            return Ok(SearchOutcome::Destructive);
        }
        if has_quote_or_bypass(query) {
            return Ok(SearchOutcome::Bypass(self.products.read().clone()));
        }

        let needle = query.to_lowercase();
        let results = self
            .products
            .read()
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        Ok(SearchOutcome::Results(results))
    }

    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().clone())
    }

    fn users_filtered(&self, filter: &str) -> Result<UserListOutcome> {
        if has_destructive_keywords(filter) {
            return Ok(UserListOutcome::Destructive);
        }
        if has_quote_or_bypass(filter) {
            return Ok(UserListOutcome::Breach(self.users.read().clone()));
        }

        let listing = self
            .users
            .read()
            .iter()
            .filter(|u| u.username.contains(filter))
            .map(PublicUser::from)
            .collect();
        Ok(UserListOutcome::Listing(listing))
    }

    fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    fn user_by_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    fn insert_comment(&self, content: &str, author: &str) -> Result<Comment> {
        let mut comments = self.comments.write();
        let comment = Comment {
            id: comments.len() as i64 + 1,
            content: content.to_string(),
            author: author.to_string(),
            created_at: Utc::now(),
        };
        comments.push(comment.clone());
        Ok(comment)
    }

    fn comments(&self) -> Result<Vec<Comment>> {
        Ok(self.comments.read().clone())
    }

    fn insert_login_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        self.login_attempts.write().push(attempt.clone());
        Ok(())
    }

    fn login_attempts_since(&self, ip: &str, window: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window)?;
        Ok(self
            .login_attempts
            .read()
            .iter()
            .filter(|a| a.ip == ip && a.timestamp > cutoff)
            .count() as u64)
    }

    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<()> {
        self.transactions.write().push(tx.clone());
        Ok(())
    }

    fn transaction_velocity(
        &self,
        ip: &str,
        fingerprint: &str,
        window: Duration,
    ) -> Result<TransactionVelocity> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window)?;
        let transactions = self.transactions.read();
        let recent: Vec<&TransactionRecord> = transactions
            .iter()
            .filter(|t| {
                (t.ip == ip || t.device_fingerprint == fingerprint) && t.timestamp > cutoff
            })
            .collect();
        Ok(TransactionVelocity {
            count: recent.len() as u64,
            total_amount: recent.iter().map(|t| t.amount).sum(),
        })
    }

    fn insert_bot_activity(&self, activity: &BotActivityRecord) -> Result<()> {
        self.bot_activity.write().push(activity.clone());
        Ok(())
    }

    fn audit_summary(&self) -> Result<AuditSummary> {
        Ok(AuditSummary {
            login_attempts: stats_for(&self.login_attempts.read(), |a| a.risk_score),
            transactions: stats_for(&self.transactions.read(), |t| t.fraud_score),
            bot_activity: stats_for(&self.bot_activity.read(), |b| b.bot_score),
        })
    }
}
