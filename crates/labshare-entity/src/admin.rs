//! Administrator account records.

use serde::{Deserialize, Serialize};

/// An administrator account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    /// Unique admin identifier.
    pub id: String,
    /// Login name, unique ignoring case.
    pub username: String,
    /// Encoded password hash (`pbkdf2_sha256$iterations$salt$digest`).
    pub password_hash: String,
    /// Whether the account may log in.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// When the account was created (RFC 3339).
    pub created_at: String,
    /// When the account last logged in (RFC 3339), if ever.
    #[serde(default)]
    pub last_login_at: Option<String>,
}

impl Admin {
    /// Case-insensitive username comparison.
    pub fn matches_username(&self, username: &str) -> bool {
        self.username.to_lowercase() == username.trim().to_lowercase()
    }

    /// A view of this account safe to return to clients.
    pub fn summary(&self) -> AdminSummary {
        AdminSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            is_active: self.is_active,
            created_at: self.created_at.clone(),
            last_login_at: self.last_login_at.clone(),
        }
    }
}

/// Admin account without the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSummary {
    /// Unique admin identifier.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Whether the account may log in.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: String,
    /// When the account last logged in, if ever.
    pub last_login_at: Option<String>,
}

/// The `admins` collection document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminsDoc {
    /// All admin accounts.
    #[serde(default)]
    pub admins: Vec<Admin>,
}

impl AdminsDoc {
    /// Find an admin by case-insensitive username.
    pub fn find_by_username(&self, username: &str) -> Option<&Admin> {
        self.admins.iter().find(|a| a.matches_username(username))
    }

    /// Find an admin by id.
    pub fn find_by_id(&self, id: &str) -> Option<&Admin> {
        self.admins.iter().find(|a| a.id == id)
    }

    /// Number of active accounts.
    pub fn active_count(&self) -> usize {
        self.admins.iter().filter(|a| a.is_active).count()
    }
}

fn default_true() -> bool {
    true
}
