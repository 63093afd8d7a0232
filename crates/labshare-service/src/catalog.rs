//! Admin-facing queries over the upload catalog.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use labshare_core::error::AppError;
use labshare_core::result::AppResult;
use labshare_core::time::now_iso;
use labshare_entity::{FileLifecycle, UploadsDoc};
use labshare_store::DocumentStore;

/// One visible file row in the admin upload view.
///
/// `filename` carries the display filename (description plus original
/// extension), which is also the name downloads are served under.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub id: String,
    #[serde(rename = "original_filename")]
    pub filename: String,
    pub description: String,
    pub version: String,
    pub created_at: String,
    pub size_bytes: u64,
    pub is_deleted: bool,
    /// Whether the blob is actually present on disk. A missing blob with
    /// live metadata indicates manual tampering with the files directory.
    pub has_blob: bool,
}

/// One batch row in the admin upload view.
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub id: String,
    pub uploader_name: String,
    pub created_at: String,
    pub files: Vec<FileView>,
}

/// A resolved download: where the blob lives and what to call it.
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
}

/// One entry in a bulk-download manifest.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadLink {
    pub file_id: String,
    pub filename: String,
    pub url: String,
}

/// Read-side and bulk-mutation operations over upload batches and files.
#[derive(Debug, Clone)]
pub struct CatalogService {
    store: Arc<DocumentStore>,
}

impl CatalogService {
    /// Creates a new catalog service over the given store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// The admin upload view: batches newest-first, files within a batch
    /// oldest-first. Soft-deleted files are hidden, and a batch whose
    /// files are all deleted is hidden entirely.
    pub async fn admin_view(&self) -> AppResult<Vec<BatchView>> {
        let doc: UploadsDoc = self.store.read().await?;

        let mut files_by_batch: HashMap<&str, Vec<&labshare_entity::UploadedFile>> =
            HashMap::new();
        for file in &doc.files {
            files_by_batch
                .entry(file.upload_batch_id.as_str())
                .or_default()
                .push(file);
        }

        let mut output = Vec::new();
        for batch in &doc.batches {
            let mut batch_files = files_by_batch.remove(batch.id.as_str()).unwrap_or_default();
            batch_files.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            let rendered: Vec<FileView> = batch_files
                .into_iter()
                .filter(|f| !f.is_deleted())
                .map(|f| FileView {
                    id: f.id.clone(),
                    filename: f.effective_filename(),
                    description: f.description.clone(),
                    version: f.version.clone(),
                    created_at: f.created_at.clone(),
                    size_bytes: f.size_bytes,
                    is_deleted: false,
                    has_blob: self.store.blob_path(&f.stored_filename).exists(),
                })
                .collect();

            if rendered.is_empty() {
                continue;
            }
            output.push(BatchView {
                id: batch.id.clone(),
                uploader_name: batch.uploader_display_name_snapshot.clone(),
                created_at: batch.created_at.clone(),
                files: rendered,
            });
        }

        output.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(output)
    }

    /// Resolve a single file for download.
    ///
    /// A missing or soft-deleted record and a record whose blob has gone
    /// missing both resolve to not-found; the messages differ so an admin
    /// can tell metadata loss from blob loss.
    pub async fn resolve_download(&self, file_id: &str) -> AppResult<Download> {
        let doc: UploadsDoc = self.store.read().await?;
        let file = doc
            .find_file(file_id)
            .filter(|f| !f.is_deleted())
            .ok_or_else(|| AppError::not_found("File not found"))?;

        let path = self.store.blob_path(&file.stored_filename);
        if !path.exists() {
            return Err(AppError::not_found("File is no longer available"));
        }
        Ok(Download {
            path,
            filename: file.effective_filename(),
            mime_type: file.mime_type.clone(),
        })
    }

    /// Build a download manifest for a set of file ids. Deleted files and
    /// files whose blobs are missing are silently skipped.
    pub async fn download_many(&self, file_ids: &[String]) -> AppResult<Vec<DownloadLink>> {
        let wanted: HashSet<&str> = file_ids.iter().map(String::as_str).collect();
        let doc: UploadsDoc = self.store.read().await?;

        let mut downloads = Vec::new();
        for file in &doc.files {
            if !wanted.contains(file.id.as_str()) || file.is_deleted() {
                continue;
            }
            if !self.store.blob_path(&file.stored_filename).exists() {
                continue;
            }
            downloads.push(DownloadLink {
                file_id: file.id.clone(),
                filename: file.effective_filename(),
                url: format!("/api/admin/files/{}/download", file.id),
            });
        }
        Ok(downloads)
    }

    /// Soft-delete a set of files: mark the records deleted in a single
    /// collection update, then unlink the blobs (best effort). The update
    /// holds the collection lock, so only the in-memory marking happens
    /// under it; blob unlinks run afterwards. Already-deleted and unknown
    /// ids are skipped. Returns the number of files deleted.
    pub async fn delete_many(&self, file_ids: &[String]) -> AppResult<usize> {
        if file_ids.is_empty() {
            return Err(AppError::validation("No files selected"));
        }
        let wanted: HashSet<String> = file_ids.iter().cloned().collect();

        let purged_blobs = self
            .store
            .update::<UploadsDoc, _, _>(move |doc| {
                let now = now_iso();
                let mut purged_blobs = Vec::new();
                for file in &mut doc.files {
                    if !wanted.contains(&file.id) || file.is_deleted() {
                        continue;
                    }
                    file.lifecycle = FileLifecycle::Deleted { at: now.clone() };
                    purged_blobs.push(file.stored_filename.clone());
                }
                Ok(purged_blobs)
            })
            .await?;

        let deleted_count = purged_blobs.len();
        for stored_filename in purged_blobs {
            let path = self.store.blob_path(&stored_filename);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to unlink blob");
                }
            }
        }

        if deleted_count > 0 {
            info!(deleted_count, "Soft-deleted files");
        }
        Ok(deleted_count)
    }

    /// Render the clipboard line for a set of files:
    /// `"{filenames} [{versions}] {{admin - uploaders}} (dd-mm-YYYY)"`.
    ///
    /// Filenames and versions keep the caller's selection order; uploader
    /// names are deduplicated and sorted case-insensitively.
    pub async fn copy_string(&self, file_ids: &[String], admin_username: &str) -> AppResult<String> {
        if file_ids.is_empty() {
            return Err(AppError::validation("No files selected"));
        }
        let doc: UploadsDoc = self.store.read().await?;
        let batches_by_id: HashMap<&str, &labshare_entity::UploadBatch> =
            doc.batches.iter().map(|b| (b.id.as_str(), b)).collect();

        let mut filename_tokens = Vec::new();
        let mut version_tokens = Vec::new();
        let mut uploader_names: Vec<String> = Vec::new();
        for file_id in file_ids {
            let Some(file) = doc.find_file(file_id).filter(|f| !f.is_deleted()) else {
                continue;
            };
            filename_tokens.push(file.copy_filename_token());
            version_tokens.push(file.copy_version_token());
            if let Some(batch) = batches_by_id.get(file.upload_batch_id.as_str()) {
                let name = &batch.uploader_display_name_snapshot;
                if !name.is_empty() && !uploader_names.contains(name) {
                    uploader_names.push(name.clone());
                }
            }
        }
        if filename_tokens.is_empty() {
            return Err(AppError::not_found("No available files found"));
        }

        uploader_names.sort_by_key(|n| n.to_lowercase());
        let date = chrono::Local::now().format("%d-%m-%Y");
        Ok(format!(
            "{} [{}] {{{} - {}}} ({date})",
            filename_tokens.join(", "),
            version_tokens.join(", "),
            admin_username,
            uploader_names.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labshare_core::error::ErrorKind;
    use labshare_entity::{UploadBatch, UploadedFile};

    async fn setup() -> (tempfile::TempDir, Arc<DocumentStore>, CatalogService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let catalog = CatalogService::new(Arc::clone(&store));
        (dir, store, catalog)
    }

    fn batch(id: &str, uploader: &str, created_at: &str) -> UploadBatch {
        UploadBatch {
            id: id.into(),
            uploader_profile_id: "u1".into(),
            uploader_display_name_snapshot: uploader.into(),
            created_at: created_at.into(),
            client_ip: None,
            file_ids: vec![],
        }
    }

    fn file(id: &str, batch_id: &str, description: &str, created_at: &str) -> UploadedFile {
        UploadedFile {
            id: id.into(),
            upload_batch_id: batch_id.into(),
            original_filename: "part.stl".into(),
            stored_filename: format!("stored_{id}.stl"),
            description: description.into(),
            version: "1".into(),
            size_bytes: 3,
            mime_type: "application/octet-stream".into(),
            created_at: created_at.into(),
            lifecycle: FileLifecycle::Active,
        }
    }

    async fn seed(store: &DocumentStore, doc: UploadsDoc, with_blobs: bool) {
        if with_blobs {
            for f in &doc.files {
                std::fs::write(store.blob_path(&f.stored_filename), b"abc").unwrap();
            }
        }
        store.replace(&doc).await.unwrap();
    }

    #[tokio::test]
    async fn admin_view_orders_and_uses_display_filenames() {
        let (_dir, store, catalog) = setup().await;
        let mut f_blank = file("f2", "b1", "  ", "2025-01-01T00:00:02Z");
        f_blank.original_filename = "fallback.json".into();
        f_blank.stored_filename = "missing.json".into();
        let doc = UploadsDoc {
            batches: vec![
                batch("b1", "Tom", "2025-01-01T00:00:00Z"),
                batch("b2", "Ann", "2025-01-02T00:00:00Z"),
            ],
            files: vec![
                f_blank,
                file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z"),
                file("f3", "b2", "Claw", "2025-01-02T00:00:01Z"),
            ],
        };
        std::fs::write(store.blob_path("stored_f1.stl"), b"abc").unwrap();
        std::fs::write(store.blob_path("stored_f3.stl"), b"abc").unwrap();
        store.replace(&doc).await.unwrap();

        let view = catalog.admin_view().await.unwrap();
        assert_eq!(view.len(), 2);
        // Newest batch first.
        assert_eq!(view[0].id, "b2");
        // Files oldest-first, display filename from the description.
        let names: Vec<&str> = view[1].files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["Arm Bracket.stl", "fallback.json"]);
        assert!(view[1].files[0].has_blob);
        assert!(!view[1].files[1].has_blob);
    }

    #[tokio::test]
    async fn fully_deleted_batches_are_hidden() {
        let (_dir, store, catalog) = setup().await;
        let mut f = file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z");
        f.lifecycle = FileLifecycle::Deleted {
            at: "2025-02-01T00:00:00Z".into(),
        };
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![f],
        };
        seed(&store, doc, false).await;

        assert!(catalog.admin_view().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_resolution_distinguishes_metadata_and_blob_loss() {
        let (_dir, store, catalog) = setup().await;
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![
                file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z"),
                file("f2", "b1", "Claw", "2025-01-01T00:00:02Z"),
            ],
        };
        std::fs::write(store.blob_path("stored_f1.stl"), b"abc").unwrap();
        store.replace(&doc).await.unwrap();

        let download = catalog.resolve_download("f1").await.unwrap();
        assert_eq!(download.filename, "Arm Bracket.stl");

        let err = catalog.resolve_download("f2").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "File is no longer available");

        let err = catalog.resolve_download("nope").await.unwrap_err();
        assert_eq!(err.message, "File not found");
    }

    #[tokio::test]
    async fn download_many_skips_deleted_and_missing_blobs() {
        let (_dir, store, catalog) = setup().await;
        let mut deleted = file("f2", "b1", "Claw", "2025-01-01T00:00:02Z");
        deleted.lifecycle = FileLifecycle::Deleted {
            at: "2025-02-01T00:00:00Z".into(),
        };
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![
                file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z"),
                deleted,
                file("f3", "b1", "Gear", "2025-01-01T00:00:03Z"),
            ],
        };
        std::fs::write(store.blob_path("stored_f1.stl"), b"abc").unwrap();
        store.replace(&doc).await.unwrap();

        let downloads = catalog
            .download_many(&["f1".into(), "f2".into(), "f3".into()])
            .await
            .unwrap();
        assert_eq!(downloads.len(), 1);
        assert_eq!(downloads[0].filename, "Arm Bracket.stl");
        assert_eq!(downloads[0].url, "/api/admin/files/f1/download");
    }

    #[tokio::test]
    async fn delete_many_unlinks_blobs_and_is_idempotent() {
        let (_dir, store, catalog) = setup().await;
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![
                file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z"),
                file("f2", "b1", "Claw", "2025-01-01T00:00:02Z"),
            ],
        };
        seed(&store, doc, true).await;

        let deleted = catalog
            .delete_many(&["f1".into(), "unknown".into()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(!store.blob_path("stored_f1.stl").exists());
        assert!(store.blob_path("stored_f2.stl").exists());

        let doc: UploadsDoc = store.read().await.unwrap();
        assert!(doc.find_file("f1").unwrap().is_deleted());
        // Batch record survives soft deletion of its files.
        assert_eq!(doc.batches.len(), 1);

        // Second call finds nothing left to delete.
        let deleted = catalog.delete_many(&["f1".into()]).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn delete_many_marks_records_even_when_blobs_are_already_gone() {
        let (_dir, store, catalog) = setup().await;
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z")],
        };
        seed(&store, doc, false).await;

        let deleted = catalog.delete_many(&["f1".into()]).await.unwrap();
        assert_eq!(deleted, 1);
        let doc: UploadsDoc = store.read().await.unwrap();
        assert!(doc.find_file("f1").unwrap().is_deleted());
    }

    #[tokio::test]
    async fn delete_many_rejects_an_empty_selection() {
        let (_dir, _store, catalog) = setup().await;
        let err = catalog.delete_many(&[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn copy_string_keeps_selection_order_and_dedups_uploaders() {
        let (_dir, store, catalog) = setup().await;
        let mut f2 = file("f2", "b2", "Desc Two.stl", "2025-01-02T00:00:01Z");
        f2.version = "v2".into();
        let doc = UploadsDoc {
            batches: vec![
                batch("b1", "Tom", "2025-01-01T00:00:00Z"),
                batch("b2", "ann", "2025-01-02T00:00:00Z"),
            ],
            files: vec![
                file("f1", "b1", "Desc One", "2025-01-01T00:00:01Z"),
                f2,
                file("f3", "b1", "Desc Three", "2025-01-01T00:00:02Z"),
            ],
        };
        seed(&store, doc, false).await;

        let text = catalog
            .copy_string(&["f1".into(), "f2".into()], "Admin")
            .await
            .unwrap();
        assert!(text.starts_with("Desc One, Desc Two [V1, V2] {Admin - ann, Tom} ("));
    }

    #[tokio::test]
    async fn copy_string_with_only_deleted_files_is_not_found() {
        let (_dir, store, catalog) = setup().await;
        let mut f = file("f1", "b1", "Arm Bracket", "2025-01-01T00:00:01Z");
        f.lifecycle = FileLifecycle::Deleted {
            at: "2025-02-01T00:00:00Z".into(),
        };
        let doc = UploadsDoc {
            batches: vec![batch("b1", "Tom", "2025-01-01T00:00:00Z")],
            files: vec![f],
        };
        seed(&store, doc, false).await;

        let err = catalog
            .copy_string(&["f1".into()], "Admin")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
