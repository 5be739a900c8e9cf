//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account that can log in and author news
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Password hash (argon2id PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Most recent successful login
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Build a not-yet-persisted user.
    ///
    /// The password must already be hashed, see `services::password::hash_password`.
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: 0,
            username,
            password_hash,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    /// Whether this user owns a record whose owner column is `owner_id`
    pub fn owns(&self, owner_id: Option<i64>) -> bool {
        owner_id == Some(self.id)
    }
}
