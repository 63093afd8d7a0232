//! The upload ingestion pipeline.
//!
//! A batch upload is a transaction over the blob directory and the
//! `uploads` collection: blobs are streamed to disk one by one, and the
//! metadata for the whole batch is appended in a single atomic update
//! only after every blob has been written in full. If anything fails
//! along the way — a validation rejection, an oversize file, an I/O
//! error, or the client disconnecting mid-stream — every blob saved so
//! far is removed and the collection is never touched.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use labshare_core::error::{AppError, ErrorKind};
use labshare_core::ids::new_record_id;
use labshare_core::result::AppResult;
use labshare_core::time::now_iso;
use labshare_entity::{
    FileLifecycle, Settings, UploadAccessMode, UploadBatch, UploadedFile, UploadsDoc,
};
use labshare_store::DocumentStore;

use crate::uploader::UploaderDirectory;

/// Streamed blobs are written in chunks of at most this size.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Accepts upload batches from contributors.
#[derive(Debug, Clone)]
pub struct IngestService {
    store: Arc<DocumentStore>,
    uploaders: UploaderDirectory,
}

impl IngestService {
    /// Creates a new ingest service.
    pub fn new(store: Arc<DocumentStore>, uploaders: UploaderDirectory) -> Self {
        Self { store, uploaders }
    }

    /// Start a new upload batch.
    ///
    /// Validates, in order: that the service accepts uploads from this
    /// caller (access mode, shared password), that every file has a
    /// non-empty description and version, and that the uploader name
    /// resolves to a usable record (created on first use). Blobs are
    /// then streamed in via [`BatchIngest::add_file`], one call per
    /// file, in the same order as `descriptions`/`versions`.
    ///
    /// Filenames are not known until each file's part of the stream
    /// arrives, so the extension allow-list is checked per file in
    /// `add_file` rather than here. An earlier file's blob can therefore
    /// reach disk before a later file's bad extension is discovered; the
    /// rollback on failure removes it again.
    ///
    /// Uploader creation is a durable side effect even if the batch
    /// later fails.
    pub async fn begin(
        &self,
        uploader_name: &str,
        uploader_grade: Option<i64>,
        upload_password: Option<&str>,
        client_ip: Option<String>,
        descriptions: Vec<String>,
        versions: Vec<String>,
    ) -> AppResult<BatchIngest> {
        if descriptions.is_empty() {
            return Err(AppError::validation("At least one file is required"));
        }
        if descriptions.len() != versions.len() {
            return Err(AppError::validation(
                "Each file must have description and version",
            ));
        }

        let settings: Settings = self.store.read().await?;
        validate_upload_access(&settings, upload_password)?;

        let mut pending: Vec<FileSlot> = Vec::with_capacity(descriptions.len());
        for (index, (description, version)) in
            descriptions.into_iter().zip(versions).enumerate()
        {
            let description = description.trim().to_string();
            let version = version.trim().to_string();
            if description.is_empty() {
                return Err(AppError::validation(format!(
                    "Description is required for file {}",
                    index + 1
                )));
            }
            if version.is_empty() {
                return Err(AppError::validation(format!(
                    "Version is required for file {}",
                    index + 1
                )));
            }
            pending.push(FileSlot {
                description,
                version,
            });
        }
        // Consumed front-to-back by add_file.
        pending.reverse();

        let uploader = self
            .uploaders
            .resolve_or_create(uploader_name, uploader_grade, None)
            .await?;

        let now = now_iso();
        Ok(BatchIngest {
            store: Arc::clone(&self.store),
            settings,
            batch: UploadBatch {
                id: new_record_id(),
                uploader_profile_id: uploader.id,
                uploader_display_name_snapshot: uploader.display_name,
                created_at: now.clone(),
                client_ip,
                file_ids: Vec::new(),
            },
            created_at: now,
            pending,
            files: Vec::new(),
            saved_blobs: Vec::new(),
            committed: false,
        })
    }
}

/// Description and version waiting for their file's bytes.
#[derive(Debug)]
struct FileSlot {
    description: String,
    version: String,
}

/// An upload batch in progress.
///
/// Call [`add_file`](Self::add_file) once per expected file, then
/// [`commit`](Self::commit). Dropping an uncommitted batch (including a
/// drop caused by request cancellation) removes every blob written so
/// far; nothing reaches the `uploads` collection.
#[derive(Debug)]
pub struct BatchIngest {
    store: Arc<DocumentStore>,
    settings: Settings,
    batch: UploadBatch,
    created_at: String,
    pending: Vec<FileSlot>,
    files: Vec<UploadedFile>,
    saved_blobs: Vec<PathBuf>,
    committed: bool,
}

impl BatchIngest {
    /// Stream one file's bytes to disk.
    ///
    /// The extension allow-list is checked before any of this file's
    /// bytes are read; earlier files in the batch may already be on disk
    /// by then (see [`IngestService::begin`]) and are cleaned up by the
    /// rollback if this one is rejected. The running size is enforced
    /// against the configured cap while streaming, so an oversize file
    /// is rejected without being buffered in full.
    pub async fn add_file<S, E>(
        &mut self,
        filename: &str,
        mime_type: Option<&str>,
        mut data: S,
    ) -> AppResult<()>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let slot = self.pending.pop().ok_or_else(|| {
            AppError::validation("Each file must have description and version")
        })?;

        let filename = if filename.is_empty() { "unnamed" } else { filename };
        if !self.settings.extension_allowed(filename) {
            return Err(AppError::validation(format!(
                "File extension not allowed: {filename}"
            )));
        }

        let stored_filename = safe_storage_name(filename);
        let target = self.store.blob_path(&stored_filename);
        // Registered before streaming so a partial write is cleaned up
        // with the rest of the batch.
        self.saved_blobs.push(target.clone());

        let max_bytes = self.settings.max_upload_bytes();
        let mut out = fs::File::create(&target).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create blob: {}", target.display()),
                e,
            )
        })?;

        let mut size_bytes: u64 = 0;
        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Validation,
                    format!("Failed to read upload stream for {filename}"),
                    e,
                )
            })?;
            size_bytes += chunk.len() as u64;
            if size_bytes > max_bytes {
                return Err(AppError::validation(format!("File too large: {filename}")));
            }
            for piece in chunk.chunks(CHUNK_SIZE) {
                out.write_all(piece).await.map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to write blob: {}", target.display()),
                        e,
                    )
                })?;
            }
        }
        out.sync_all().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to flush blob: {}", target.display()),
                e,
            )
        })?;

        let basename = basename_of(filename);
        let file = UploadedFile {
            id: new_record_id(),
            upload_batch_id: self.batch.id.clone(),
            original_filename: basename.to_string(),
            stored_filename,
            description: slot.description,
            version: slot.version,
            size_bytes,
            mime_type: mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or("application/octet-stream")
                .to_string(),
            created_at: self.created_at.clone(),
            lifecycle: FileLifecycle::Active,
        };
        self.batch.file_ids.push(file.id.clone());
        self.files.push(file);
        Ok(())
    }

    /// Append the batch and all its file records to the `uploads`
    /// collection in one atomic update.
    pub async fn commit(mut self) -> AppResult<UploadBatch> {
        if !self.pending.is_empty() {
            return Err(AppError::validation(
                "Each file must have description and version",
            ));
        }
        if self.files.is_empty() {
            return Err(AppError::validation("At least one file is required"));
        }

        let batch = self.batch.clone();
        let files = std::mem::take(&mut self.files);
        let file_count = files.len();
        self.store
            .update::<UploadsDoc, _, _>({
                let batch = batch.clone();
                move |doc| {
                    doc.files.extend(files);
                    doc.batches.push(batch);
                    Ok(())
                }
            })
            .await?;

        self.committed = true;
        info!(
            batch_id = %batch.id,
            uploader = %batch.uploader_display_name_snapshot,
            files = file_count,
            "Committed upload batch"
        );
        Ok(batch)
    }

    /// Discard the batch and remove every blob written so far.
    pub fn abort(self) {
        // Drop does the work.
    }
}

impl Drop for BatchIngest {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in self.saved_blobs.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove blob during rollback");
                }
            }
        }
    }
}

fn validate_upload_access(settings: &Settings, upload_password: Option<&str>) -> AppResult<()> {
    match settings.upload_access_mode {
        UploadAccessMode::OpenLan => Ok(()),
        UploadAccessMode::SharedPassword => {
            if settings.upload_shared_password.is_empty() {
                return Err(AppError::service_unavailable(
                    "Upload password mode is misconfigured",
                ));
            }
            if upload_password != Some(settings.upload_shared_password.as_str()) {
                return Err(AppError::unauthorized("Invalid upload password"));
            }
            Ok(())
        }
        UploadAccessMode::Disabled => Err(AppError::forbidden(
            "Upload mode does not allow public uploads",
        )),
    }
}

/// Opaque on-disk name for an uploaded file: a fresh UUID plus the
/// client basename with every run of unsafe characters collapsed to an
/// underscore. Path separators in the client filename never reach the
/// filesystem.
fn safe_storage_name(filename: &str) -> String {
    let basename = basename_of(filename);
    let basename = if basename.is_empty() { "file" } else { basename };

    let mut cleaned = String::with_capacity(basename.len());
    let mut in_run = false;
    for ch in basename.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            cleaned.push(ch);
            in_run = false;
        } else if !in_run {
            cleaned.push('_');
            in_run = true;
        }
    }
    format!("{}_{cleaned}", Uuid::new_v4().simple())
}

/// The final path component of a client-supplied filename.
fn basename_of(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    fn bytes_stream(
        chunks: Vec<&'static [u8]>,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn setup() -> (tempfile::TempDir, Arc<DocumentStore>, IngestService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path()).await.unwrap());
        let uploaders = UploaderDirectory::new(Arc::clone(&store));
        let ingest = IngestService::new(Arc::clone(&store), uploaders);
        (dir, store, ingest)
    }

    fn blob_count(store: &DocumentStore) -> usize {
        std::fs::read_dir(store.files_dir()).unwrap().count()
    }

    #[tokio::test]
    async fn single_file_batch_commits_blob_and_metadata() {
        let (_dir, store, ingest) = setup().await;

        let mut batch = ingest
            .begin(
                "Tom",
                Some(9),
                None,
                Some("192.168.1.10".into()),
                vec!["Arm Bracket".into()],
                vec!["1".into()],
            )
            .await
            .unwrap();
        batch
            .add_file("part.stl", None, bytes_stream(vec![b"solid", b" cube"]))
            .await
            .unwrap();
        let committed = batch.commit().await.unwrap();

        let doc: UploadsDoc = store.read().await.unwrap();
        assert_eq!(doc.batches.len(), 1);
        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.batches[0].id, committed.id);
        assert_eq!(doc.files[0].size_bytes, 10);
        assert_eq!(doc.files[0].description, "Arm Bracket");
        assert_eq!(doc.files[0].mime_type, "application/octet-stream");
        assert!(!doc.files[0].is_deleted());
        assert!(store.blob_path(&doc.files[0].stored_filename).exists());
    }

    #[tokio::test]
    async fn oversize_file_rolls_back_every_saved_blob() {
        let (_dir, store, ingest) = setup().await;
        store
            .update::<Settings, _, _>(|s| {
                s.max_file_size_mb = 1;
                Ok(())
            })
            .await
            .unwrap();

        let mut batch = ingest
            .begin(
                "Tom",
                Some(9),
                None,
                None,
                vec!["One".into(), "Two".into(), "Three".into()],
                vec!["1".into(), "1".into(), "1".into()],
            )
            .await
            .unwrap();
        batch
            .add_file("a.stl", None, bytes_stream(vec![b"aa"]))
            .await
            .unwrap();
        batch
            .add_file("b.stl", None, bytes_stream(vec![b"bb"]))
            .await
            .unwrap();

        let big: &'static [u8] = Box::leak(vec![0u8; 2 * 1024 * 1024].into_boxed_slice());
        let err = batch
            .add_file("c.stl", None, bytes_stream(vec![big]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        batch.abort();

        assert_eq!(blob_count(&store), 0);
        let doc: UploadsDoc = store.read().await.unwrap();
        assert!(doc.batches.is_empty());
        assert!(doc.files.is_empty());
    }

    #[tokio::test]
    async fn bad_extension_on_a_later_file_rolls_back_earlier_blobs() {
        let (_dir, store, ingest) = setup().await;

        let mut batch = ingest
            .begin(
                "Tom",
                Some(9),
                None,
                None,
                vec!["One".into(), "Two".into()],
                vec!["1".into(), "1".into()],
            )
            .await
            .unwrap();
        batch
            .add_file("a.stl", None, bytes_stream(vec![b"aa"]))
            .await
            .unwrap();
        // The first blob is already on disk when the second filename
        // turns out to be disallowed.
        assert_eq!(blob_count(&store), 1);

        let err = batch
            .add_file("b.txt", None, bytes_stream(vec![b"bb"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        batch.abort();

        assert_eq!(blob_count(&store), 0);
        let doc: UploadsDoc = store.read().await.unwrap();
        assert!(doc.files.is_empty());
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected_before_reading_bytes() {
        let (_dir, store, ingest) = setup().await;

        let mut batch = ingest
            .begin("Tom", Some(9), None, None, vec!["Notes".into()], vec!["1".into()])
            .await
            .unwrap();
        let err = batch
            .add_file("notes.txt", None, bytes_stream(vec![b"hello"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        batch.abort();

        assert_eq!(blob_count(&store), 0);
    }

    #[tokio::test]
    async fn blank_description_rejects_the_whole_batch_upfront() {
        let (_dir, _store, ingest) = setup().await;

        let err = ingest
            .begin(
                "Tom",
                Some(9),
                None,
                None,
                vec!["Ok".into(), "  ".into()],
                vec!["1".into(), "2".into()],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn uploader_creation_survives_a_failed_batch() {
        let (_dir, store, ingest) = setup().await;

        let mut batch = ingest
            .begin("Tom", Some(9), None, None, vec!["Notes".into()], vec!["1".into()])
            .await
            .unwrap();
        let _ = batch
            .add_file("notes.txt", None, bytes_stream(vec![b"x"]))
            .await
            .unwrap_err();
        batch.abort();

        let uploaders: labshare_entity::UploadersDoc = store.read().await.unwrap();
        assert_eq!(uploaders.uploaders.len(), 1);
        assert_eq!(uploaders.uploaders[0].display_name, "Tom");
    }

    #[tokio::test]
    async fn shared_password_mode_enforces_the_password() {
        let (_dir, store, ingest) = setup().await;
        store
            .update::<Settings, _, _>(|s| {
                s.upload_access_mode = UploadAccessMode::SharedPassword;
                s.upload_shared_password = "robots".into();
                Ok(())
            })
            .await
            .unwrap();

        let err = ingest
            .begin("Tom", Some(9), Some("wrong"), None, vec!["D".into()], vec!["1".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        let err = ingest
            .begin("Tom", Some(9), None, None, vec!["D".into()], vec!["1".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);

        assert!(ingest
            .begin("Tom", Some(9), Some("robots"), None, vec!["D".into()], vec!["1".into()])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn misconfigured_password_mode_is_service_unavailable() {
        let (_dir, store, ingest) = setup().await;
        store
            .update::<Settings, _, _>(|s| {
                s.upload_access_mode = UploadAccessMode::SharedPassword;
                s.upload_shared_password = String::new();
                Ok(())
            })
            .await
            .unwrap();

        let err = ingest
            .begin("Tom", Some(9), Some("anything"), None, vec!["D".into()], vec!["1".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn disabled_mode_is_forbidden() {
        let (_dir, store, ingest) = setup().await;
        store
            .update::<Settings, _, _>(|s| {
                s.upload_access_mode = UploadAccessMode::Disabled;
                Ok(())
            })
            .await
            .unwrap();

        let err = ingest
            .begin("Tom", Some(9), None, None, vec!["D".into()], vec!["1".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn dropping_an_uncommitted_batch_removes_blobs() {
        let (_dir, store, ingest) = setup().await;

        let mut batch = ingest
            .begin("Tom", Some(9), None, None, vec!["D".into()], vec!["1".into()])
            .await
            .unwrap();
        batch
            .add_file("part.stl", None, bytes_stream(vec![b"data"]))
            .await
            .unwrap();
        assert_eq!(blob_count(&store), 1);

        drop(batch);
        assert_eq!(blob_count(&store), 0);
    }

    #[test]
    fn storage_names_strip_paths_and_unsafe_characters() {
        let name = safe_storage_name("../../etc/pass wd?.stl");
        let suffix = name.split_once('_').unwrap().1;
        assert_eq!(suffix, "pass_wd_.stl");

        let name = safe_storage_name("C:\\Users\\kid\\part v2.stl");
        let suffix = name.split_once('_').unwrap().1;
        assert_eq!(suffix, "part_v2.stl");
    }

    #[test]
    fn storage_names_are_unique_per_call() {
        assert_ne!(safe_storage_name("a.stl"), safe_storage_name("a.stl"));
    }
}
