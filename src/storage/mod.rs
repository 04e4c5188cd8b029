pub mod memory;
pub mod sqlite;

use std::time::Duration;

use anyhow::Result;

use crate::models::audit::{AuditSummary, BotActivityRecord, LoginAttempt, TransactionRecord};
use crate::models::catalog::{Comment, Product, PublicUser, User};

/// Result of a product search. The store decides whether the query looked
/// like an injection attempt and which canned path it takes.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Normal substring match.
    Results(Vec<Product>),
    /// Quote-plus-OR pattern: the WHERE clause was bypassed and every
    /// product comes back.
    Bypass(Vec<Product>),
    /// Destructive keyword in the query. The route layer answers with the
    /// canned "database damaged" 500; the actual tables are never touched.
    Destructive,
}

/// Result of a user listing with an attacker-controlled filter.
#[derive(Debug, Clone)]
pub enum UserListOutcome {
    /// Normal listing, passwords redacted.
    Listing(Vec<PublicUser>),
    /// Quote-plus-OR pattern: full rows including plaintext passwords.
    Breach(Vec<User>),
    /// Destructive keyword in the filter.
    Destructive,
}

/// Count and amount sum of recent transactions from one IP or device.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionVelocity {
    pub count: u64,
    pub total_amount: f64,
}

/// Storage abstraction over the demo's two interchangeable backends.
///
/// `memory` simulates SQL injection by pattern-matching the input and
/// branching to canned breach responses; `sqlite` concatenates user input
/// into real SQL against an embedded engine. Reference tables (users,
/// products) are immutable after `seed`; the audit tables are append-only;
/// no update or delete path exists by design.
pub trait Store: Send + Sync {
    /// Create schema (where applicable) and insert the fixed reference rows.
    /// Also clears any previous audit rows, matching the demo's
    /// everything-resets-on-restart contract.
    fn seed(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;

    fn products(&self) -> Result<Vec<Product>>;

    fn search_products(&self, query: &str) -> Result<SearchOutcome>;

    /// Unredacted user rows. Only the canned breach paths consume this.
    fn users(&self) -> Result<Vec<User>>;

    fn users_filtered(&self, filter: &str) -> Result<UserListOutcome>;

    fn user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Credential check. The sqlite backend concatenates both arguments into
    /// the query string (genuinely injectable); the memory backend compares
    /// fields directly.
    fn user_by_credentials(&self, username: &str, password: &str) -> Result<Option<User>>;

    fn insert_comment(&self, content: &str, author: &str) -> Result<Comment>;

    fn comments(&self) -> Result<Vec<Comment>>;

    fn insert_login_attempt(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Number of login attempts recorded from `ip` within the last `window`.
    fn login_attempts_since(&self, ip: &str, window: Duration) -> Result<u64>;

    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<()>;

    /// Count and amount sum of transactions from the same IP or device
    /// fingerprint within the last `window`.
    fn transaction_velocity(
        &self,
        ip: &str,
        fingerprint: &str,
        window: Duration,
    ) -> Result<TransactionVelocity>;

    fn insert_bot_activity(&self, activity: &BotActivityRecord) -> Result<()>;

    fn audit_summary(&self) -> Result<AuditSummary>;
}

// ---------------------------------------------------------------------------
// Injection pattern checks: case-sensitive, exactly like the demo they feed
// ---------------------------------------------------------------------------

/// Keywords that would mutate data if the input reached a real query.
pub fn has_destructive_keywords(input: &str) -> bool {
    input.contains("DROP") || input.contains("DELETE") || input.contains("UPDATE")
}

/// The classic `' OR '1'='1` shape that bypasses a quoted WHERE clause.
pub fn has_quote_or_bypass(input: &str) -> bool {
    input.contains('\'') && input.contains("OR")
}

/// UNION-based extraction probe.
pub fn has_union_probe(input: &str) -> bool {
    input.contains("UNION") || input.contains("SELECT")
}

// ---------------------------------------------------------------------------
// Seed data: fixed reference rows shared by both backends
// ---------------------------------------------------------------------------

pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            username: "admin".to_string(),
            password: "admin123".to_string(),
            email: "admin@demo.com".to_string(),
        },
        User {
            id: 2,
            username: "user1".to_string(),
            password: "password".to_string(),
            email: "user1@demo.com".to_string(),
        },
        User {
            id: 3,
            username: "john".to_string(),
            password: "john123".to_string(),
            email: "john@demo.com".to_string(),
        },
    ]
}

pub fn seed_products() -> Vec<Product> {
    vec![
        Product {
            id: 1,
            name: "Laptop".to_string(),
            price: 999.99,
            description: "High-performance laptop".to_string(),
        },
        Product {
            id: 2,
            name: "Phone".to_string(),
            price: 599.99,
            description: "Latest smartphone".to_string(),
        },
        Product {
            id: 3,
            name: "Tablet".to_string(),
            price: 399.99,
            description: "Portable tablet device".to_string(),
        },
    ]
}
