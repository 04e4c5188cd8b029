use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seeded user account. The password is stored in plaintext on purpose:
/// the canned breach responses expose it verbatim to give a WAF something
/// to detect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Redacted view of a [`User`] for normal (non-breach) responses.
/// Every success payload goes through this type so the password field
/// cannot leak by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub description: String,
}

/// Stored comment. Content is kept verbatim, with no escaping and no deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}
