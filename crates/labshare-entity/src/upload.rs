//! Upload batch and uploaded file records.

use serde::{Deserialize, Serialize};

/// One upload transaction containing one or more files from a single
/// uploader at a point in time. Batches are immutable after creation and
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    /// Unique batch identifier.
    pub id: String,
    /// The uploader record this batch belongs to.
    pub uploader_profile_id: String,
    /// Uploader display name frozen at batch time. Renaming the uploader
    /// later does not rewrite history.
    pub uploader_display_name_snapshot: String,
    /// When the batch was created (RFC 3339).
    pub created_at: String,
    /// Client address the batch came from, when known.
    #[serde(default)]
    pub client_ip: Option<String>,
    /// Ids of the files persisted with this batch.
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// Deletion state of an uploaded file.
///
/// Soft deletion is monotone: a file goes from `Active` to `Deleted` and
/// never back. Modeling this as a tagged state (rather than a flag plus a
/// nullable timestamp) makes a deleted-without-timestamp record
/// unrepresentable, while the serialized form keeps the legacy
/// `is_deleted`/`deleted_at` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LifecycleRepr", into = "LifecycleRepr")]
pub enum FileLifecycle {
    /// The file is live; its blob should exist on disk.
    Active,
    /// The file was soft-deleted at the given time; the blob is gone but
    /// the metadata row is retained for history.
    Deleted {
        /// When the file was soft-deleted (RFC 3339).
        at: String,
    },
}

/// Legacy on-disk shape of [`FileLifecycle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LifecycleRepr {
    #[serde(default)]
    is_deleted: bool,
    #[serde(default)]
    deleted_at: Option<String>,
}

impl From<LifecycleRepr> for FileLifecycle {
    fn from(repr: LifecycleRepr) -> Self {
        if repr.is_deleted {
            // Hand-edited legacy rows may lack the timestamp.
            Self::Deleted {
                at: repr.deleted_at.unwrap_or_default(),
            }
        } else {
            Self::Active
        }
    }
}

impl From<FileLifecycle> for LifecycleRepr {
    fn from(lifecycle: FileLifecycle) -> Self {
        match lifecycle {
            FileLifecycle::Active => Self {
                is_deleted: false,
                deleted_at: None,
            },
            FileLifecycle::Deleted { at } => Self {
                is_deleted: true,
                deleted_at: Some(at),
            },
        }
    }
}

/// Metadata for a single uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Unique file identifier.
    pub id: String,
    /// The batch this file arrived in.
    pub upload_batch_id: String,
    /// Filename as supplied by the client (basename only).
    pub original_filename: String,
    /// Opaque, collision-resistant on-disk name under the files
    /// directory. This is the only reference from metadata to the blob.
    pub stored_filename: String,
    /// Contributor-supplied description.
    pub description: String,
    /// Contributor-supplied version label.
    pub version: String,
    /// Size of the stored blob in bytes.
    pub size_bytes: u64,
    /// MIME type reported by the client.
    pub mime_type: String,
    /// When the file was uploaded (RFC 3339).
    pub created_at: String,
    /// Soft-deletion state.
    #[serde(flatten)]
    pub lifecycle: FileLifecycle,
}

impl UploadedFile {
    /// Whether the file has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(self.lifecycle, FileLifecycle::Deleted { .. })
    }

    /// The filename an admin sees and downloads under: the description
    /// with the original file's extension appended.
    ///
    /// A blank description falls back to the original filename; a
    /// description that already ends in the original's extension
    /// (compared case-insensitively) is used as-is.
    pub fn effective_filename(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            return self.original_filename.clone();
        }
        match extension_of(&self.original_filename) {
            Some(ext) => {
                let suffix = format!(".{}", ext.to_lowercase());
                if description.to_lowercase().ends_with(&suffix) {
                    description.to_string()
                } else {
                    format!("{description}.{ext}")
                }
            }
            None => description.to_string(),
        }
    }

    /// The filename token used in copy-string rendering: the description
    /// without any trailing extension, falling back to the original
    /// filename's stem when the description is blank.
    pub fn copy_filename_token(&self) -> String {
        let description = self.description.trim();
        if description.is_empty() {
            return match self.original_filename.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => self.original_filename.clone(),
            };
        }
        if let Some(ext) = extension_of(&self.original_filename) {
            let suffix = format!(".{}", ext.to_lowercase());
            if description.to_lowercase().ends_with(&suffix) {
                return description[..description.len() - suffix.len()].to_string();
            }
        }
        description.to_string()
    }

    /// The version token used in copy-string rendering: `V` plus the
    /// version label, without doubling an existing `v`/`V` prefix.
    pub fn copy_version_token(&self) -> String {
        let version = self.version.trim();
        let rest = version
            .strip_prefix('v')
            .or_else(|| version.strip_prefix('V'))
            .unwrap_or(version);
        format!("V{rest}")
    }
}

/// Extension (without the dot) of a filename, if it has a non-empty stem.
fn extension_of(filename: &str) -> Option<&str> {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// The `uploads` collection document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadsDoc {
    /// All upload batches, append-only.
    #[serde(default)]
    pub batches: Vec<UploadBatch>,
    /// All uploaded file records, including soft-deleted ones.
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

impl UploadsDoc {
    /// Find a file record by id.
    pub fn find_file(&self, id: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.id == id)
    }
}
