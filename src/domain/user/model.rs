use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// User identity record
#[derive(Clone, Debug)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub age: u32,
    /// bcrypt hash; never leaves the service
    pub password_hash: String,
    pub roles: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn role_list(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

/// Canonical email used for storage and lookups, so uniqueness and login
/// ignore letter case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical username used for storage and lookups.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
