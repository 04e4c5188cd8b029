use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::audit::{
    AuditSummary, BotActivityRecord, LoginAttempt, TableStats, TransactionRecord,
};
use crate::models::catalog::{Comment, Product, PublicUser, User};

use super::{
    has_destructive_keywords, has_quote_or_bypass, seed_products, seed_users, SearchOutcome,
    Store, TransactionVelocity, UserListOutcome,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Embedded-SQL backend. Defaults to `:memory:` so every restart starts from
/// the seed rows, matching the demo's no-durability contract.
///
/// The lookup paths used by the vulnerable endpoints build their SQL by
/// string concatenation of user input. That is the entire point of this
/// backend: the queries are genuinely injectable so a WAF sees real SQL
/// errors and real bypasses. Audit inserts use bound parameters because they
/// are not part of the attack surface.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id        INTEGER PRIMARY KEY,
                username  TEXT NOT NULL,
                password  TEXT NOT NULL,
                email     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL,
                price       REAL NOT NULL,
                description TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comments (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                content    TEXT NOT NULL,
                author     TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS login_attempts (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                username           TEXT,
                ip_address         TEXT,
                user_agent         TEXT,
                device_fingerprint TEXT,
                success            INTEGER NOT NULL DEFAULT 0,
                timestamp          TEXT NOT NULL,
                risk_score         REAL NOT NULL DEFAULT 0.0
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id            INTEGER,
                amount             REAL,
                currency           TEXT,
                merchant           TEXT,
                ip_address         TEXT,
                device_fingerprint TEXT,
                timestamp          TEXT NOT NULL,
                fraud_score        REAL NOT NULL DEFAULT 0.0,
                status             TEXT NOT NULL DEFAULT 'pending'
            );

            CREATE TABLE IF NOT EXISTS bot_activity (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                ip_address      TEXT,
                user_agent      TEXT,
                request_pattern TEXT,
                bot_score       REAL NOT NULL DEFAULT 0.0,
                timestamp       TEXT NOT NULL
            );
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn product_rows(&self, sql: &str) -> Result<Vec<Product>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                price: row.get(2)?,
                description: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn user_rows(&self, sql: &str) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                email: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn table_stats(&self, table: &str, score_column: &str) -> Result<TableStats> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let sql = format!("SELECT COUNT(*), AVG({}) FROM {}", score_column, table);
        let (total, avg): (i64, Option<f64>) =
            conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(TableStats {
            total: total as u64,
            average_score: avg.unwrap_or(0.0),
        })
    }
}

impl Store for SqliteStore {
    fn seed(&self) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute_batch(
            "DELETE FROM users;
             DELETE FROM products;
             DELETE FROM comments;
             DELETE FROM login_attempts;
             DELETE FROM transactions;
             DELETE FROM bot_activity;",
        )?;

        for user in seed_users() {
            conn.execute(
                "INSERT INTO users (id, username, password, email) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.username, user.password, user.email],
            )?;
        }
        for product in seed_products() {
            conn.execute(
                "INSERT INTO products (id, name, price, description) VALUES (?1, ?2, ?3, ?4)",
                params![product.id, product.name, product.price, product.description],
            )?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn products(&self) -> Result<Vec<Product>> {
        self.product_rows("SELECT id, name, price, description FROM products")
    }

    fn search_products(&self, query: &str) -> Result<SearchOutcome> {
        if has_destructive_keywords(query) {
            return Ok(SearchOutcome::Destructive);
        }

        // Deliberate string concatenation; the query is injectable.
        let sql = format!(
            "SELECT id, name, price, description FROM products \
             WHERE name LIKE '%{}%' OR description LIKE '%{}%'",
            query, query
        );
        let rows = self.product_rows(&sql)?;

        if has_quote_or_bypass(query) {
            Ok(SearchOutcome::Bypass(rows))
        } else {
            Ok(SearchOutcome::Results(rows))
        }
    }

    fn users(&self) -> Result<Vec<User>> {
        self.user_rows("SELECT id, username, password, email FROM users")
    }

    fn users_filtered(&self, filter: &str) -> Result<UserListOutcome> {
        if has_destructive_keywords(filter) {
            return Ok(UserListOutcome::Destructive);
        }
        if has_quote_or_bypass(filter) {
            return Ok(UserListOutcome::Breach(self.users()?));
        }

        // Deliberate string concatenation; the query is injectable.
        let sql = format!(
            "SELECT id, username, email FROM users WHERE username LIKE '%{}%'",
            filter
        );
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(PublicUser {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
            })
        })?;
        Ok(UserListOutcome::Listing(
            rows.collect::<rusqlite::Result<Vec<_>>>()?,
        ))
    }

    fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!(
            "SELECT id, username, password, email FROM users WHERE id = {}",
            id
        );
        Ok(self.user_rows(&sql)?.into_iter().next())
    }

    fn user_by_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        // Deliberate string concatenation; `admin' --` walks right in.
        let sql = format!(
            "SELECT id, username, password, email FROM users \
             WHERE username = '{}' AND password = '{}'",
            username, password
        );
        Ok(self.user_rows(&sql)?.into_iter().next())
    }

    fn insert_comment(&self, content: &str, author: &str) -> Result<Comment> {
        let now = Utc::now();
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO comments (content, author, created_at) VALUES (?1, ?2, ?3)",
            params![content, author, format_ts(now)],
        )?;
        Ok(Comment {
            id: conn.last_insert_rowid(),
            content: content.to_string(),
            author: author.to_string(),
            created_at: now,
        })
    }

    fn comments(&self) -> Result<Vec<Comment>> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT id, content, author, created_at FROM comments ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut comments = Vec::new();
        for row in rows {
            let (id, content, author, created_at) = row?;
            comments.push(Comment {
                id,
                content,
                author,
                created_at: parse_ts(&created_at),
            });
        }
        Ok(comments)
    }

    fn insert_login_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO login_attempts \
             (username, ip_address, user_agent, device_fingerprint, success, timestamp, risk_score) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.username,
                attempt.ip,
                attempt.user_agent,
                attempt.device_fingerprint,
                attempt.success as i32,
                format_ts(attempt.timestamp),
                attempt.risk_score,
            ],
        )?;
        Ok(())
    }

    fn login_attempts_since(&self, ip: &str, window: Duration) -> Result<u64> {
        let cutoff = format_ts(Utc::now() - chrono::Duration::from_std(window)?);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM login_attempts WHERE ip_address = ?1 AND timestamp > ?2",
            params![ip, cutoff],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert_transaction(&self, tx: &TransactionRecord) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO transactions \
             (user_id, amount, currency, merchant, ip_address, device_fingerprint, \
              timestamp, fraud_score, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                tx.user_id,
                tx.amount,
                tx.currency,
                tx.merchant,
                tx.ip,
                tx.device_fingerprint,
                format_ts(tx.timestamp),
                tx.fraud_score,
                tx.status,
            ],
        )?;
        Ok(())
    }

    fn transaction_velocity(
        &self,
        ip: &str,
        fingerprint: &str,
        window: Duration,
    ) -> Result<TransactionVelocity> {
        let cutoff = format_ts(Utc::now() - chrono::Duration::from_std(window)?);
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let (count, total): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), SUM(amount) FROM transactions \
             WHERE (ip_address = ?1 OR device_fingerprint = ?2) AND timestamp > ?3",
            params![ip, fingerprint, cutoff],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TransactionVelocity {
            count: count as u64,
            total_amount: total.unwrap_or(0.0),
        })
    }

    fn insert_bot_activity(&self, activity: &BotActivityRecord) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO bot_activity \
             (ip_address, user_agent, request_pattern, bot_score, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                activity.ip,
                activity.user_agent,
                activity.request_pattern,
                activity.bot_score,
                format_ts(activity.timestamp),
            ],
        )?;
        Ok(())
    }

    fn audit_summary(&self) -> Result<AuditSummary> {
        Ok(AuditSummary {
            login_attempts: self.table_stats("login_attempts", "risk_score")?,
            transactions: self.table_stats("transactions", "fraud_score")?,
            bot_activity: self.table_stats("bot_activity", "bot_score")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::new(":memory:").unwrap();
        store.seed().unwrap();
        store
    }

    #[test]
    fn test_seed_and_lookup() {
        let store = seeded();
        assert_eq!(store.products().unwrap().len(), 3);
        let admin = store.user_by_id(1).unwrap().unwrap();
        assert_eq!(admin.username, "admin");
    }

    #[test]
    fn test_credential_injection_bypasses_password() {
        let store = seeded();
        // The trailing comment swallows the password clause entirely.
        let user = store.user_by_credentials("admin' --", "whatever").unwrap();
        assert_eq!(user.unwrap().username, "admin");
    }

    #[test]
    fn test_quote_or_bypass_returns_all_products() {
        let store = seeded();
        match store.search_products("' OR '1'='1").unwrap() {
            SearchOutcome::Bypass(rows) => assert_eq!(rows.len(), 3),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_destructive_query_never_reaches_the_engine() {
        let store = seeded();
        match store.search_products(";DROP TABLE products;--").unwrap() {
            SearchOutcome::Destructive => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.products().unwrap().len(), 3);
    }

    #[test]
    fn test_broken_injection_surfaces_raw_sql_error() {
        let store = seeded();
        // An unbalanced quote produces a genuine SQL syntax error, which the
        // route layer reports verbatim in a 500 body.
        assert!(store.search_products("odd'quote").is_err());
    }

    #[test]
    fn test_velocity_and_summary() {
        let store = seeded();
        let tx = TransactionRecord {
            user_id: 1,
            amount: 6000.0,
            currency: "USD".to_string(),
            merchant: "shop".to_string(),
            ip: "10.0.0.1".to_string(),
            device_fingerprint: "fp".to_string(),
            timestamp: Utc::now(),
            fraud_score: 0.5,
            status: "approved".to_string(),
        };
        store.insert_transaction(&tx).unwrap();
        store.insert_transaction(&tx).unwrap();

        let v = store
            .transaction_velocity("10.0.0.1", "none", Duration::from_secs(3600))
            .unwrap();
        assert_eq!(v.count, 2);
        assert!((v.total_amount - 12000.0).abs() < f64::EPSILON);

        let summary = store.audit_summary().unwrap();
        assert_eq!(summary.transactions.total, 2);
        assert!((summary.transactions.average_score - 0.5).abs() < 1e-9);
        assert_eq!(summary.bot_activity.total, 0);
        assert_eq!(summary.bot_activity.average_score, 0.0);
    }
}
