//! Admin account management.
//!
//! Every mutation here is a single atomic store update: the invariant
//! checks (unique username, the last-active-admin floor, self-action
//! refusals) run against the same snapshot that gets persisted.

use std::sync::Arc;

use tracing::info;

use labshare_core::error::AppError;
use labshare_core::ids::new_record_id;
use labshare_core::result::AppResult;
use labshare_core::time::now_iso;
use labshare_entity::{Admin, AdminSummary, AdminsDoc};
use labshare_store::DocumentStore;

use crate::password::PasswordHasher;

/// Username created when no admin account exists yet.
pub const DEFAULT_ADMIN_USERNAME: &str = "Admin";
/// Environment variable holding the bootstrap password.
pub const DEFAULT_ADMIN_PASSWORD_ENV: &str = "LABSHARE_DEFAULT_ADMIN_PASSWORD";

const MIN_PASSWORD_LEN: usize = 6;

/// Changes an admin may apply to another admin account.
#[derive(Debug, Clone, Default)]
pub struct AdminPatch {
    /// New password, if changing.
    pub password: Option<String>,
    /// New active flag, if changing.
    pub is_active: Option<bool>,
}

/// Manages the `admins` collection.
#[derive(Debug, Clone)]
pub struct AdminDirectory {
    /// The document store.
    store: Arc<DocumentStore>,
    /// Password hasher.
    hasher: PasswordHasher,
}

impl AdminDirectory {
    /// Creates a new admin directory over the given store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
        }
    }

    /// Create the default admin account on first run.
    ///
    /// A no-op when the account already exists. The bootstrap password
    /// must come from the environment; refusing to invent one keeps a
    /// fresh install from shipping with a known credential.
    pub async fn ensure_default_admin(&self) -> AppResult<()> {
        let doc: AdminsDoc = self.store.read().await?;
        if doc.find_by_username(DEFAULT_ADMIN_USERNAME).is_some() {
            return Ok(());
        }

        let password = std::env::var(DEFAULT_ADMIN_PASSWORD_ENV).map_err(|_| {
            AppError::configuration(format!(
                "{DEFAULT_ADMIN_PASSWORD_ENV} is required when bootstrapping the default admin. \
                 Set it before first run, or pre-create admins.json."
            ))
        })?;

        let password_hash = self.hasher.hash_password(&password);
        self.store
            .update::<AdminsDoc, _, _>(move |doc| {
                if doc.find_by_username(DEFAULT_ADMIN_USERNAME).is_some() {
                    return Ok(());
                }
                doc.admins.push(Admin {
                    id: new_record_id(),
                    username: DEFAULT_ADMIN_USERNAME.to_string(),
                    password_hash,
                    is_active: true,
                    created_at: now_iso(),
                    last_login_at: None,
                });
                Ok(())
            })
            .await?;

        info!(username = DEFAULT_ADMIN_USERNAME, "Bootstrapped default admin");
        Ok(())
    }

    /// List all admin accounts, sorted by username.
    pub async fn list(&self) -> AppResult<Vec<AdminSummary>> {
        let doc: AdminsDoc = self.store.read().await?;
        let mut summaries: Vec<AdminSummary> = doc.admins.iter().map(Admin::summary).collect();
        summaries.sort_by_key(|a| a.username.to_lowercase());
        Ok(summaries)
    }

    /// Create a new admin account.
    pub async fn create(&self, username: &str, password: &str) -> AppResult<AdminSummary> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::validation("username is required"));
        }
        check_password(password)?;

        let password_hash = self.hasher.hash_password(password);
        let created = self
            .store
            .update::<AdminsDoc, _, _>(move |doc| {
                if doc.find_by_username(&username).is_some() {
                    return Err(AppError::conflict("Admin username already exists"));
                }
                let admin = Admin {
                    id: new_record_id(),
                    username,
                    password_hash,
                    is_active: true,
                    created_at: now_iso(),
                    last_login_at: None,
                };
                doc.admins.push(admin.clone());
                Ok(admin)
            })
            .await?;

        info!(admin_id = %created.id, "Created admin account");
        Ok(created.summary())
    }

    /// Apply a patch to an admin account.
    ///
    /// `acting_admin_id` is the caller; an admin may not deactivate their
    /// own account, and the last active account may not be deactivated.
    pub async fn update(
        &self,
        admin_id: &str,
        acting_admin_id: &str,
        patch: AdminPatch,
    ) -> AppResult<AdminSummary> {
        let password_hash = match patch.password.as_deref() {
            Some(password) => {
                check_password(password)?;
                Some(self.hasher.hash_password(password))
            }
            None => None,
        };

        let admin_id = admin_id.to_string();
        let acting = acting_admin_id.to_string();
        let updated = self
            .store
            .update::<AdminsDoc, _, _>(move |doc| {
                let target = doc
                    .find_by_id(&admin_id)
                    .ok_or_else(|| AppError::not_found("Admin not found"))?
                    .clone();

                if patch.is_active == Some(false) {
                    if target.id == acting {
                        return Err(AppError::conflict("You cannot deactivate your own account"));
                    }
                    if target.is_active && doc.active_count() <= 1 {
                        return Err(AppError::conflict("At least one active admin must remain"));
                    }
                }

                let entry = doc
                    .admins
                    .iter_mut()
                    .find(|a| a.id == admin_id)
                    .ok_or_else(|| AppError::not_found("Admin not found"))?;
                if let Some(hash) = password_hash {
                    entry.password_hash = hash;
                }
                if let Some(is_active) = patch.is_active {
                    entry.is_active = is_active;
                }
                Ok(entry.clone())
            })
            .await?;

        Ok(updated.summary())
    }

    /// Delete an admin account.
    ///
    /// Refused when the target is the caller, or when removing it would
    /// leave zero active admins.
    pub async fn delete(&self, admin_id: &str, acting_admin_id: &str) -> AppResult<()> {
        if admin_id == acting_admin_id {
            return Err(AppError::conflict("You cannot delete your own account"));
        }

        let admin_id = admin_id.to_string();
        self.store
            .update::<AdminsDoc, _, _>(move |doc| {
                if doc.find_by_id(&admin_id).is_none() {
                    return Err(AppError::not_found("Admin not found"));
                }
                let remaining_active = doc
                    .admins
                    .iter()
                    .filter(|a| a.id != admin_id && a.is_active)
                    .count();
                if remaining_active == 0 {
                    return Err(AppError::conflict("At least one active admin must remain"));
                }
                doc.admins.retain(|a| a.id != admin_id);
                Ok(())
            })
            .await
    }
}

fn check_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
