//! Admin session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labshare_core::time::parse_iso;

/// An authenticated admin session.
///
/// The `id` is the opaque bearer token handed to the client in a cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token (≥256-bit entropy).
    pub id: String,
    /// The admin this session belongs to.
    pub admin_id: String,
    /// Username snapshot taken at login time.
    pub username: String,
    /// When the session was created (RFC 3339).
    pub created_at: String,
    /// When the session stops being honored (RFC 3339).
    pub expires_at: String,
}

impl Session {
    /// Whether the session has expired as of `now`.
    ///
    /// A session whose expiry does not parse is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match parse_iso(&self.expires_at) {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }
}

/// The `sessions` collection document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsDoc {
    /// All live (and possibly stale) sessions.
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl SessionsDoc {
    /// Find a session by token.
    pub fn find(&self, token: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == token)
    }

    /// Drop every session that has expired as of `now`.
    ///
    /// Returns the number of sessions removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|s| !s.is_expired(now));
        before - self.sessions.len()
    }
}
