//! The atomic document store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use uuid::Uuid;

use labshare_core::error::{AppError, ErrorKind};
use labshare_core::result::AppResult;

use crate::collections::Collection;

/// Crash-safe read/replace store over named JSON collections.
///
/// One instance owns the on-disk representation of every collection; no
/// other component touches the filesystem for metadata. Each collection
/// has its own async mutex, so mutations on different collections never
/// contend, while two mutations on the same collection are fully
/// serialized.
#[derive(Debug)]
pub struct DocumentStore {
    /// Directory holding the collection documents.
    data_dir: PathBuf,
    /// Directory holding uploaded file blobs.
    files_dir: PathBuf,
    /// One lock per collection name, created on first use.
    locks: std::sync::Mutex<HashMap<&'static str, Arc<AsyncMutex<()>>>>,
}

impl DocumentStore {
    /// Create a store rooted at `data_dir`, creating the data and files
    /// directories if needed.
    pub async fn open(data_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let data_dir = data_dir.into();
        let files_dir = data_dir.join("files");
        fs::create_dir_all(&files_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create data directory: {}", files_dir.display()),
                e,
            )
        })?;
        Ok(Self {
            data_dir,
            files_dir,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// The directory uploaded blobs live in.
    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Absolute path of a stored blob.
    pub fn blob_path(&self, stored_filename: &str) -> PathBuf {
        self.files_dir.join(stored_filename)
    }

    /// Read a collection snapshot.
    ///
    /// A missing collection file is materialized with the collection's
    /// default payload first.
    pub async fn read<C: Collection>(&self) -> AppResult<C> {
        let _guard = self.lock_for(C::NAME).lock_owned().await;
        self.read_unlocked::<C>().await
    }

    /// Replace a collection with a new snapshot (collection snapshot
    /// replace). Prefer [`update`](Self::update) for read-modify-write
    /// sequences; two separately locked `read` + `replace` calls are not
    /// atomic against a concurrent mutator.
    pub async fn replace<C: Collection>(&self, doc: &C) -> AppResult<()> {
        let _guard = self.lock_for(C::NAME).lock_owned().await;
        self.write_unlocked::<C>(doc).await
    }

    /// Atomically read, mutate, and persist a collection.
    ///
    /// The collection's lock is held across the entire sequence, so two
    /// concurrent `update` calls on the same collection cannot interleave
    /// and no update is ever lost. If the mutator returns an error the
    /// document is not written; if the mutator leaves the document
    /// unchanged, the write is skipped entirely.
    pub async fn update<C, T, F>(&self, mutate: F) -> AppResult<T>
    where
        C: Collection,
        F: FnOnce(&mut C) -> AppResult<T>,
    {
        let _guard = self.lock_for(C::NAME).lock_owned().await;
        let mut doc = self.read_unlocked::<C>().await?;
        let before = serde_json::to_vec(&doc).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Failed to serialize collection '{}'", C::NAME),
                e,
            )
        })?;
        let value = mutate(&mut doc)?;
        let after = serde_json::to_vec(&doc).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Failed to serialize collection '{}'", C::NAME),
                e,
            )
        })?;
        if before != after {
            self.write_unlocked::<C>(&doc).await?;
        }
        Ok(value)
    }

    fn lock_for(&self, name: &'static str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name).or_default())
    }

    fn doc_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.json"))
    }

    async fn read_unlocked<C: Collection>(&self) -> AppResult<C> {
        let path = self.doc_path(C::NAME);
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Corrupt collection document: {}", path.display()),
                    e,
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let doc = C::default();
                self.write_unlocked::<C>(&doc).await?;
                Ok(doc)
            }
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read collection: {}", path.display()),
                e,
            )),
        }
    }

    /// Serialize the document, write it to a temp file in the target's
    /// directory, flush, and rename over the target. The target is always
    /// either the old complete version or the new complete version.
    async fn write_unlocked<C: Collection>(&self, doc: &C) -> AppResult<()> {
        let path = self.doc_path(C::NAME);
        let tmp_path = self
            .data_dir
            .join(format!(".{}.{}.tmp", C::NAME, Uuid::new_v4().simple()));

        let bytes = serde_json::to_vec_pretty(doc).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Failed to serialize collection '{}'", C::NAME),
                e,
            )
        })?;

        let result = self.persist_tmp(&tmp_path, &path, &bytes).await;
        if result.is_err() {
            // Orphaned temp cleanup is best-effort and must not mask the
            // original write failure.
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
        }
        result
    }

    async fn persist_tmp(&self, tmp_path: &Path, path: &Path, bytes: &[u8]) -> AppResult<()> {
        let map_err = |action: &str, e: std::io::Error| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to {action}: {}", path.display()),
                e,
            )
        };

        let mut tmp = fs::File::create(tmp_path)
            .await
            .map_err(|e| map_err("create temp file for", e))?;
        tmp.write_all(bytes)
            .await
            .map_err(|e| map_err("write", e))?;
        tmp.sync_all().await.map_err(|e| map_err("flush", e))?;
        drop(tmp);

        fs::rename(tmp_path, path)
            .await
            .map_err(|e| map_err("replace", e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote collection document");
        Ok(())
    }
}
