//! Session lifecycle manager — login, validation, logout.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info};

use labshare_core::error::AppError;
use labshare_core::result::AppResult;
use labshare_core::time::now_iso;
use labshare_entity::{Admin, AdminsDoc, Session, SessionsDoc};
use labshare_store::DocumentStore;

use crate::password::PasswordHasher;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "lab_session";
/// Fixed session lifetime.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Uniform message for every failed login. Deliberately does not
/// distinguish an unknown username from a wrong password.
const LOGIN_FAILED: &str = "Invalid username or password";
/// Uniform message for every failed session validation.
const SESSION_INVALID: &str = "Admin login required";

/// Manages admin credentials and the session collection.
#[derive(Debug, Clone)]
pub struct SessionManager {
    /// The document store.
    store: Arc<DocumentStore>,
    /// Password hasher.
    hasher: PasswordHasher,
}

impl SessionManager {
    /// Creates a new session manager over the given store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
        }
    }

    /// Authenticate an admin by username and password.
    ///
    /// Looks up the account case-insensitively, requires it to be active,
    /// and verifies the password. On success the account's last login
    /// time is updated. Every failure mode returns the same unauthorized
    /// error so usernames cannot be enumerated.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<Admin> {
        // Verification is a deliberately slow key derivation, so it runs
        // against a snapshot; only the last_login_at touch takes the
        // admins lock.
        let doc: AdminsDoc = self.store.read().await?;
        let admin = doc
            .find_by_username(username)
            .filter(|a| a.is_active)
            .cloned()
            .ok_or_else(|| AppError::unauthorized(LOGIN_FAILED))?;

        if !self.hasher.verify_password(password, &admin.password_hash) {
            return Err(AppError::unauthorized(LOGIN_FAILED));
        }

        let admin_id = admin.id.clone();
        let updated = self
            .store
            .update::<AdminsDoc, _, _>(move |doc| {
                let entry = doc
                    .admins
                    .iter_mut()
                    .find(|a| a.id == admin_id)
                    .filter(|a| a.is_active)
                    .ok_or_else(|| AppError::unauthorized(LOGIN_FAILED))?;
                entry.last_login_at = Some(now_iso());
                Ok(entry.clone())
            })
            .await?;

        info!(admin_id = %updated.id, "Admin logged in");
        Ok(updated)
    }

    /// Issue a new session for an authenticated admin.
    ///
    /// Returns the opaque token the client presents in its cookie.
    pub async fn create_session(&self, admin: &Admin) -> AppResult<String> {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = Utc::now();
        let session = Session {
            id: token.clone(),
            admin_id: admin.id.clone(),
            username: admin.username.clone(),
            created_at: now.to_rfc3339(),
            expires_at: (now + Duration::hours(SESSION_TTL_HOURS)).to_rfc3339(),
        };

        self.store
            .update::<SessionsDoc, _, _>(move |doc| {
                doc.sessions.push(session);
                Ok(())
            })
            .await?;

        Ok(token)
    }

    /// Validate a presented session token and return its admin.
    ///
    /// Opportunistically sweeps every globally expired session, which
    /// also removes the presented session if its own expiry has passed.
    /// The session is additionally deleted if its admin no longer exists
    /// or is inactive. All rejections share one unauthorized message.
    pub async fn validate(&self, token: Option<&str>) -> AppResult<Admin> {
        let token = token.ok_or_else(|| AppError::unauthorized(SESSION_INVALID))?;

        let now = Utc::now();
        let lookup = token.to_string();
        let session = self
            .store
            .update::<SessionsDoc, _, _>(move |doc| {
                let swept = doc.sweep_expired(now);
                if swept > 0 {
                    debug!(count = swept, "Swept expired sessions");
                }
                Ok(doc.find(&lookup).cloned())
            })
            .await?
            .ok_or_else(|| AppError::unauthorized(SESSION_INVALID))?;

        let admins: AdminsDoc = self.store.read().await?;
        match admins.find_by_id(&session.admin_id) {
            Some(admin) if admin.is_active => Ok(admin.clone()),
            _ => {
                self.logout(&session.id).await?;
                Err(AppError::unauthorized(SESSION_INVALID))
            }
        }
    }

    /// Delete a session by token. A no-op if the session is already gone.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let token = token.to_string();
        self.store
            .update::<SessionsDoc, _, _>(move |doc| {
                doc.sessions.retain(|s| s.id != token);
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labshare_core::ids::new_record_id;

    async fn setup() -> (tempfile::TempDir, Arc<DocumentStore>, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let manager = SessionManager::new(Arc::clone(&store));
        (dir, store, manager)
    }

    async fn seed_admin(store: &DocumentStore, username: &str, password: &str) -> Admin {
        let admin = Admin {
            id: new_record_id(),
            username: username.to_string(),
            password_hash: PasswordHasher::new().hash_password(password),
            is_active: true,
            created_at: now_iso(),
            last_login_at: None,
        };
        let seeded = admin.clone();
        store
            .update::<AdminsDoc, _, _>(move |doc| {
                doc.admins.push(seeded);
                Ok(())
            })
            .await
            .unwrap();
        admin
    }

    #[tokio::test]
    async fn login_round_trip() {
        let (_dir, store, manager) = setup().await;
        seed_admin(&store, "Admin", "correct horse").await;

        let admin = manager.authenticate("admin", "correct horse").await.unwrap();
        assert!(admin.last_login_at.is_some());

        let token = manager.create_session(&admin).await.unwrap();
        let validated = manager.validate(Some(&token)).await.unwrap();
        assert_eq!(validated.id, admin.id);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_fail_identically() {
        let (_dir, store, manager) = setup().await;
        seed_admin(&store, "Admin", "correct horse").await;

        let missing = manager.authenticate("nobody", "pw").await.unwrap_err();
        let wrong = manager.authenticate("Admin", "wrong").await.unwrap_err();
        assert_eq!(missing.message, wrong.message);
        assert_eq!(missing.kind, wrong.kind);
    }

    #[tokio::test]
    async fn expired_session_is_rejected_and_removed() {
        let (_dir, store, manager) = setup().await;
        let admin = seed_admin(&store, "Admin", "pw").await;
        let token = manager.create_session(&admin).await.unwrap();

        // Backdate the expiry past the TTL.
        let stale = (Utc::now() - Duration::minutes(1)).to_rfc3339();
        store
            .update::<SessionsDoc, _, _>(move |doc| {
                doc.sessions[0].expires_at = stale;
                Ok(())
            })
            .await
            .unwrap();

        assert!(manager.validate(Some(&token)).await.is_err());
        let doc: SessionsDoc = store.read().await.unwrap();
        assert!(doc.sessions.is_empty());
    }

    #[tokio::test]
    async fn session_near_ttl_boundary() {
        let (_dir, store, manager) = setup().await;
        let admin = seed_admin(&store, "Admin", "pw").await;
        let token = manager.create_session(&admin).await.unwrap();

        // Valid one minute before expiry.
        let almost = (Utc::now() + Duration::minutes(1)).to_rfc3339();
        store
            .update::<SessionsDoc, _, _>(move |doc| {
                doc.sessions[0].expires_at = almost;
                Ok(())
            })
            .await
            .unwrap();
        assert!(manager.validate(Some(&token)).await.is_ok());
    }

    #[tokio::test]
    async fn deactivated_admin_invalidates_session() {
        let (_dir, store, manager) = setup().await;
        let admin = seed_admin(&store, "Admin", "pw").await;
        let token = manager.create_session(&admin).await.unwrap();

        store
            .update::<AdminsDoc, _, _>(|doc| {
                doc.admins[0].is_active = false;
                Ok(())
            })
            .await
            .unwrap();

        assert!(manager.validate(Some(&token)).await.is_err());
        let doc: SessionsDoc = store.read().await.unwrap();
        assert!(doc.sessions.is_empty());
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (_dir, _store, manager) = setup().await;
        let err = manager.validate(None).await.unwrap_err();
        assert_eq!(err.kind, labshare_core::error::ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (_dir, store, manager) = setup().await;
        let admin = seed_admin(&store, "Admin", "pw").await;
        let token = manager.create_session(&admin).await.unwrap();

        manager.logout(&token).await.unwrap();
        manager.logout(&token).await.unwrap();
        assert!(manager.validate(Some(&token)).await.is_err());
    }
}
