//! Application state shared across all handlers.

use std::sync::Arc;

use labshare_auth::{AdminDirectory, SessionManager};
use labshare_core::config::AppConfig;
use labshare_service::{CatalogService, IngestService, SettingsService, UploaderDirectory};
use labshare_store::DocumentStore;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`. All fields are
/// `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// The document store.
    pub store: Arc<DocumentStore>,
    /// Session lifecycle manager.
    pub sessions: Arc<SessionManager>,
    /// Admin account management.
    pub admins: Arc<AdminDirectory>,
    /// Uploader identity resolution and administration.
    pub uploaders: Arc<UploaderDirectory>,
    /// Upload batch ingestion.
    pub ingest: Arc<IngestService>,
    /// Admin catalog queries and bulk mutations.
    pub catalog: Arc<CatalogService>,
    /// Runtime settings management.
    pub settings: Arc<SettingsService>,
}

impl AppState {
    /// Wire up the full dependency graph over an opened store.
    pub fn new(config: Arc<AppConfig>, store: Arc<DocumentStore>) -> Self {
        let uploaders = UploaderDirectory::new(Arc::clone(&store));
        Self {
            sessions: Arc::new(SessionManager::new(Arc::clone(&store))),
            admins: Arc::new(AdminDirectory::new(Arc::clone(&store))),
            ingest: Arc::new(IngestService::new(Arc::clone(&store), uploaders.clone())),
            uploaders: Arc::new(uploaders),
            catalog: Arc::new(CatalogService::new(Arc::clone(&store))),
            settings: Arc::new(SettingsService::new(Arc::clone(&store))),
            config,
            store,
        }
    }
}
