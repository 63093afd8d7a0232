//! Runtime service settings.
//!
//! A singleton collection mutated by admins. Every field carries a serde
//! default, so fields missing from an older settings file fall back to
//! the documented defaults on read.

use serde::{Deserialize, Serialize};

/// Who may submit uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadAccessMode {
    /// Anyone on the LAN may upload.
    OpenLan,
    /// Uploads require the shared password.
    SharedPassword,
    /// Uploads are turned off.
    Disabled,
}

/// The `settings` collection document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Days after which non-deleted files are purged. A value of zero or
    /// less disables retention cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Per-file upload size cap in megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Allowed file extensions (lowercase, leading dot). Empty permits
    /// every extension.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Who may submit uploads.
    #[serde(default = "default_access_mode")]
    pub upload_access_mode: UploadAccessMode,
    /// Shared password checked when `upload_access_mode` is
    /// `shared_password`.
    #[serde(default)]
    pub upload_shared_password: String,
    /// Port the API server is expected to listen on.
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,
    /// Port the frontend dev server is expected to listen on.
    #[serde(default = "default_web_port")]
    pub web_port: u16,
}

impl Settings {
    /// The upload size cap in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Whether `filename` passes the extension allow-list.
    ///
    /// Case-insensitive suffix match; an empty allow-list permits
    /// everything. A file without an extension only passes an empty list.
    pub fn extension_allowed(&self, filename: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let lower = filename.to_lowercase();
        let ext = match lower.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!(".{ext}"),
            _ => return false,
        };
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            max_file_size_mb: default_max_file_size_mb(),
            allowed_extensions: default_allowed_extensions(),
            upload_access_mode: default_access_mode(),
            upload_shared_password: String::new(),
            backend_port: default_backend_port(),
            web_port: default_web_port(),
        }
    }
}

fn default_retention_days() -> i64 {
    30
}

fn default_max_file_size_mb() -> u64 {
    1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec![".stl".to_string(), ".json".to_string()]
}

fn default_access_mode() -> UploadAccessMode {
    UploadAccessMode::OpenLan
}

fn default_backend_port() -> u16 {
    8000
}

fn default_web_port() -> u16 {
    5173
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"retention_days": 7}"#).unwrap();
        assert_eq!(settings.retention_days, 7);
        assert_eq!(settings.max_file_size_mb, 1024);
        assert_eq!(settings.upload_access_mode, UploadAccessMode::OpenLan);
        assert_eq!(settings.backend_port, 8000);
    }

    #[test]
    fn access_mode_round_trips_snake_case() {
        let value = serde_json::to_value(UploadAccessMode::SharedPassword).unwrap();
        assert_eq!(value, serde_json::json!("shared_password"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let settings = Settings::default();
        assert!(settings.extension_allowed("part.STL"));
        assert!(settings.extension_allowed("config.json"));
        assert!(!settings.extension_allowed("notes.txt"));
        assert!(!settings.extension_allowed("no_extension"));
    }

    #[test]
    fn empty_allow_list_permits_everything() {
        let settings = Settings {
            allowed_extensions: vec![],
            ..Settings::default()
        };
        assert!(settings.extension_allowed("anything.xyz"));
        assert!(settings.extension_allowed("no_extension"));
    }
}
