//! Runtime settings management.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use labshare_core::error::AppError;
use labshare_core::result::AppResult;
use labshare_entity::{Settings, UploadAccessMode};
use labshare_store::DocumentStore;

/// A partial settings update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub retention_days: Option<i64>,
    pub max_file_size_mb: Option<u64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub upload_access_mode: Option<UploadAccessMode>,
    pub upload_shared_password: Option<String>,
    pub backend_port: Option<u16>,
    pub web_port: Option<u16>,
}

/// Reads and updates the `settings` collection.
#[derive(Debug, Clone)]
pub struct SettingsService {
    store: Arc<DocumentStore>,
}

impl SettingsService {
    /// Creates a new settings service over the given store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// The current settings.
    pub async fn get(&self) -> AppResult<Settings> {
        self.store.read().await
    }

    /// Validate and apply a partial update, returning the new settings.
    pub async fn update(&self, patch: SettingsPatch) -> AppResult<Settings> {
        if let Some(retention_days) = patch.retention_days {
            if retention_days < 1 {
                return Err(AppError::validation("retention_days must be >= 1"));
            }
        }
        if let Some(max_file_size_mb) = patch.max_file_size_mb {
            if max_file_size_mb < 1 {
                return Err(AppError::validation("max_file_size_mb must be >= 1"));
            }
        }
        if let Some(port) = patch.backend_port {
            if port == 0 {
                return Err(AppError::validation(
                    "backend_port must be between 1 and 65535",
                ));
            }
        }
        if let Some(port) = patch.web_port {
            if port == 0 {
                return Err(AppError::validation("web_port must be between 1 and 65535"));
            }
        }

        let updated = self
            .store
            .update::<Settings, _, _>(move |settings| {
                if let Some(retention_days) = patch.retention_days {
                    settings.retention_days = retention_days;
                }
                if let Some(max_file_size_mb) = patch.max_file_size_mb {
                    settings.max_file_size_mb = max_file_size_mb;
                }
                if let Some(extensions) = patch.allowed_extensions {
                    settings.allowed_extensions = normalize_extensions(extensions);
                }
                if let Some(mode) = patch.upload_access_mode {
                    settings.upload_access_mode = mode;
                }
                if let Some(password) = patch.upload_shared_password {
                    settings.upload_shared_password = password;
                }
                if let Some(port) = patch.backend_port {
                    settings.backend_port = port;
                }
                if let Some(port) = patch.web_port {
                    settings.web_port = port;
                }
                Ok(settings.clone())
            })
            .await?;

        info!("Updated service settings");
        Ok(updated)
    }
}

/// Trim, lowercase, prepend a missing leading dot, drop empties, and
/// dedup while preserving order.
fn normalize_extensions(values: Vec<String>) -> Vec<String> {
    let mut normalized = Vec::new();
    for value in values {
        let ext = value.trim().to_lowercase();
        if ext.is_empty() {
            continue;
        }
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use labshare_core::error::ErrorKind;

    async fn setup() -> (tempfile::TempDir, SettingsService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        (dir, SettingsService::new(store))
    }

    #[tokio::test]
    async fn get_materializes_defaults() {
        let (_dir, service) = setup().await;
        let settings = service.get().await.unwrap();
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.max_file_size_mb, 1024);
    }

    #[tokio::test]
    async fn patch_only_touches_supplied_fields() {
        let (_dir, service) = setup().await;
        let updated = service
            .update(SettingsPatch {
                retention_days: Some(7),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.retention_days, 7);
        assert_eq!(updated.max_file_size_mb, 1024);
        assert_eq!(updated.upload_access_mode, UploadAccessMode::OpenLan);
    }

    #[tokio::test]
    async fn out_of_range_values_are_rejected() {
        let (_dir, service) = setup().await;
        for patch in [
            SettingsPatch {
                retention_days: Some(0),
                ..SettingsPatch::default()
            },
            SettingsPatch {
                max_file_size_mb: Some(0),
                ..SettingsPatch::default()
            },
            SettingsPatch {
                backend_port: Some(0),
                ..SettingsPatch::default()
            },
            SettingsPatch {
                web_port: Some(0),
                ..SettingsPatch::default()
            },
        ] {
            let err = service.update(patch).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }

        // A rejected patch leaves settings untouched.
        let settings = service.get().await.unwrap();
        assert_eq!(settings.retention_days, 30);
    }

    #[tokio::test]
    async fn extensions_are_normalized() {
        let (_dir, service) = setup().await;
        let updated = service
            .update(SettingsPatch {
                allowed_extensions: Some(vec![
                    "STL".into(),
                    " .json ".into(),
                    "stl".into(),
                    "".into(),
                ]),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();
        assert_eq!(
            updated.allowed_extensions,
            vec![".stl".to_string(), ".json".to_string()]
        );
    }
}
