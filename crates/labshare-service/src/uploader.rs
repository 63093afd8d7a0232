//! Uploader identity resolution and administration.
//!
//! [`UploaderDirectory::resolve_or_create`] is the single chokepoint for
//! mapping a display name to a persistent contributor record: the public
//! upload flow, the admin uploader endpoints, and any bulk import all go
//! through it.

use std::sync::Arc;

use tracing::info;

use labshare_core::error::AppError;
use labshare_core::ids::new_record_id;
use labshare_core::result::AppResult;
use labshare_core::time::now_iso;
use labshare_entity::uploader::{MAX_GRADE, MIN_GRADE};
use labshare_entity::{Uploader, UploadersDoc, normalize_name, parse_grade};
use labshare_store::DocumentStore;

/// Changes an admin may apply to an uploader record.
#[derive(Debug, Clone, Default)]
pub struct UploaderPatch {
    /// New display name, if changing.
    pub display_name: Option<String>,
    /// New grade, if changing.
    pub grade: Option<i64>,
    /// New extra group set, if changing.
    pub extra_groups: Option<Vec<String>>,
    /// New upload-active flag, if changing.
    pub is_active_for_upload: Option<bool>,
}

/// Manages the `uploaders` collection.
#[derive(Debug, Clone)]
pub struct UploaderDirectory {
    /// The document store.
    store: Arc<DocumentStore>,
}

impl UploaderDirectory {
    /// Creates a new uploader directory over the given store.
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolve a display name to an uploader record, creating one on
    /// first use.
    ///
    /// For an existing record: a missing grade is backfilled (and the
    /// record reactivated) when a valid grade is supplied; a disabled
    /// name is rejected; a record still lacking a grade is rejected
    /// without creating a duplicate. A new record requires a grade in
    /// 7–12.
    ///
    /// This mutation is deliberately not rolled back if a caller's
    /// larger operation fails afterwards.
    pub async fn resolve_or_create(
        &self,
        display_name: &str,
        grade: Option<i64>,
        extra_groups: Option<Vec<String>>,
    ) -> AppResult<Uploader> {
        let normalized = normalize_name(display_name);
        if normalized.is_empty() {
            return Err(AppError::validation("Uploader name is required"));
        }

        let display_name = display_name.trim().to_string();
        let supplied_grade = parse_grade(grade);

        self.store
            .update::<UploadersDoc, _, _>(move |doc| {
                if let Some(index) = doc
                    .uploaders
                    .iter()
                    .position(|u| u.normalized_name == normalized)
                {
                    let uploader = &mut doc.uploaders[index];
                    if uploader.grade.is_none() {
                        if let Some(grade) = supplied_grade {
                            uploader.grade = Some(grade);
                            uploader.is_active_for_upload = true;
                            uploader.updated_at = now_iso();
                        }
                    }
                    if !uploader.is_active_for_upload {
                        return Err(AppError::validation(
                            "Uploader name is disabled for new uploads",
                        ));
                    }
                    if uploader.grade.is_none() {
                        return Err(AppError::validation(
                            "Uploader grade is missing; ask admin to set it",
                        ));
                    }
                    return Ok(uploader.clone());
                }

                let grade = supplied_grade.ok_or_else(|| {
                    AppError::validation(format!(
                        "New uploader requires grade between {MIN_GRADE} and {MAX_GRADE}"
                    ))
                })?;

                let now = now_iso();
                let uploader = Uploader {
                    id: new_record_id(),
                    display_name,
                    normalized_name: normalized,
                    grade: Some(grade),
                    extra_groups: normalize_groups(extra_groups.unwrap_or_default()),
                    is_active_for_upload: true,
                    created_at: now.clone(),
                    updated_at: now,
                };
                info!(uploader_id = %uploader.id, "Created uploader record");
                doc.uploaders.push(uploader.clone());
                Ok(uploader)
            })
            .await
    }

    /// Uploaders currently active for upload, sorted by display name.
    pub async fn list_active(&self) -> AppResult<Vec<Uploader>> {
        let doc: UploadersDoc = self.store.read().await?;
        let mut active: Vec<Uploader> = doc
            .uploaders
            .into_iter()
            .filter(|u| u.is_active_for_upload)
            .collect();
        active.sort_by_key(|u| u.display_name.to_lowercase());
        Ok(active)
    }

    /// All uploader records including disabled ones, sorted by display
    /// name.
    pub async fn list_all(&self) -> AppResult<Vec<Uploader>> {
        let doc: UploadersDoc = self.store.read().await?;
        let mut all = doc.uploaders;
        all.sort_by_key(|u| u.display_name.to_lowercase());
        Ok(all)
    }

    /// Apply an admin patch to an uploader record.
    pub async fn update(&self, uploader_id: &str, patch: UploaderPatch) -> AppResult<Uploader> {
        // Input shape checks happen before the store is touched.
        let new_name = match patch.display_name.as_deref() {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::validation("display_name cannot be empty"));
                }
                Some(name)
            }
            None => None,
        };
        let new_grade = match patch.grade {
            Some(grade) => Some(parse_grade(Some(grade)).ok_or_else(|| {
                AppError::validation(format!(
                    "grade must be between {MIN_GRADE} and {MAX_GRADE}"
                ))
            })?),
            None => None,
        };

        let uploader_id = uploader_id.to_string();
        self.store
            .update::<UploadersDoc, _, _>(move |doc| {
                let index = doc
                    .uploaders
                    .iter()
                    .position(|u| u.id == uploader_id)
                    .ok_or_else(|| AppError::not_found("Uploader not found"))?;

                if let Some(name) = &new_name {
                    let normalized = normalize_name(name);
                    let duplicate = doc
                        .uploaders
                        .iter()
                        .any(|u| u.normalized_name == normalized && u.id != uploader_id);
                    if duplicate {
                        return Err(AppError::conflict("Uploader name already exists"));
                    }
                    doc.uploaders[index].display_name = name.clone();
                    doc.uploaders[index].normalized_name = normalized;
                }

                let uploader = &mut doc.uploaders[index];
                if let Some(grade) = new_grade {
                    uploader.grade = Some(grade);
                }
                if let Some(groups) = patch.extra_groups {
                    uploader.extra_groups = normalize_groups(groups);
                }
                if let Some(active) = patch.is_active_for_upload {
                    uploader.is_active_for_upload = active;
                }
                uploader.updated_at = now_iso();
                Ok(uploader.clone())
            })
            .await
    }

    /// Disable an uploader for new submissions. The record is retained.
    pub async fn disable(&self, uploader_id: &str) -> AppResult<()> {
        let uploader_id = uploader_id.to_string();
        self.store
            .update::<UploadersDoc, _, _>(move |doc| {
                let uploader = doc
                    .uploaders
                    .iter_mut()
                    .find(|u| u.id == uploader_id)
                    .ok_or_else(|| AppError::not_found("Uploader not found"))?;
                uploader.is_active_for_upload = false;
                uploader.updated_at = now_iso();
                Ok(())
            })
            .await
    }
}

/// Trim, drop empties, sort, and dedup a group list.
fn normalize_groups(groups: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = groups
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}
