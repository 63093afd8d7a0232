//! Upload handlers — the public uploader directory and batch submission,
//! plus the admin file catalog.

use std::net::SocketAddr;

use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, Multipart, Path, State};
use axum::http::header;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use labshare_core::error::{AppError, ErrorKind};
use labshare_entity::{UploadBatch, Uploader};
use labshare_service::catalog::{BatchView, DownloadLink};
use labshare_service::ingest::BatchIngest;

use crate::error::{ApiError, ApiResult};
use crate::extractors::AdminSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUploaderRequest {
    pub display_name: String,
    pub grade: i64,
    #[serde(default)]
    pub extra_groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileIdsRequest {
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadersResponse {
    pub uploaders: Vec<Uploader>,
}

#[derive(Debug, Serialize)]
pub struct UploaderResponse {
    pub uploader: Uploader,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch: UploadBatch,
}

#[derive(Debug, Serialize)]
pub struct UploadsResponse {
    pub uploads: Vec<BatchView>,
}

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub downloads: Vec<DownloadLink>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CopyStringResponse {
    pub text: String,
}

/// GET /api/uploaders — the public contributor picker.
pub async fn list_uploaders(State(state): State<AppState>) -> ApiResult<Json<UploadersResponse>> {
    let uploaders = state.uploaders.list_active().await?;
    Ok(Json(UploadersResponse { uploaders }))
}

/// POST /api/uploaders — pre-register a contributor name.
pub async fn create_uploader(
    State(state): State<AppState>,
    Json(req): Json<CreateUploaderRequest>,
) -> ApiResult<Json<UploaderResponse>> {
    let uploader = state
        .uploaders
        .resolve_or_create(&req.display_name, Some(req.grade), Some(req.extra_groups))
        .await?;
    Ok(Json(UploaderResponse { uploader }))
}

/// POST /api/upload-batches — multipart batch submission.
///
/// Expects the metadata fields (`uploader_name`, `uploader_grade`,
/// `descriptions`, `versions`, `upload_password`) before the `files`
/// fields; each file is streamed straight to disk as it arrives. If
/// anything fails, including the client disconnecting mid-upload, every
/// blob written so far is rolled back and no metadata is recorded.
pub async fn create_upload_batch(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> ApiResult<Json<BatchResponse>> {
    let mut uploader_name = String::new();
    let mut uploader_grade: Option<i64> = None;
    let mut upload_password: Option<String> = None;
    let mut descriptions: Vec<String> = Vec::new();
    let mut versions: Vec<String> = Vec::new();
    let mut batch: Option<BatchIngest> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "files" {
            let ingest = match batch.as_mut() {
                Some(ingest) => ingest,
                None => {
                    let begun = state
                        .ingest
                        .begin(
                            &uploader_name,
                            uploader_grade,
                            upload_password.as_deref(),
                            Some(addr.ip().to_string()),
                            std::mem::take(&mut descriptions),
                            std::mem::take(&mut versions),
                        )
                        .await?;
                    batch.insert(begun)
                }
            };
            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let mime_type = field.content_type().map(str::to_string);
            ingest
                .add_file(&filename, mime_type.as_deref(), Box::pin(field))
                .await?;
            continue;
        }

        if batch.is_some() {
            return Err(ApiError(AppError::validation(
                "Form fields must come before files",
            )));
        }
        let text = field
            .text()
            .await
            .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?;
        match name.as_str() {
            "uploader_name" => uploader_name = text,
            "uploader_grade" => uploader_grade = text.trim().parse().ok(),
            "upload_password" => upload_password = Some(text),
            "descriptions" => descriptions.push(text),
            "versions" => versions.push(text),
            _ => {}
        }
    }

    let batch = batch.ok_or_else(|| AppError::validation("At least one file is required"))?;
    let committed = batch.commit().await?;
    Ok(Json(BatchResponse { batch: committed }))
}

/// GET /api/admin/uploads
pub async fn admin_uploads(
    State(state): State<AppState>,
    _session: AdminSession,
) -> ApiResult<Json<UploadsResponse>> {
    let uploads = state.catalog.admin_view().await?;
    Ok(Json(UploadsResponse { uploads }))
}

/// GET /api/admin/files/{file_id}/download
pub async fn admin_download_file(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(file_id): Path<String>,
) -> ApiResult<Response> {
    let download = state.catalog.resolve_download(&file_id).await?;

    let file = tokio::fs::File::open(&download.path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to open blob: {}", download.path.display()),
            e,
        )
    })?;
    let body = Body::from_stream(ReaderStream::new(file));

    // Strip quote characters rather than escaping them; filenames come
    // from descriptions admins already vetted.
    let safe_name = download.filename.replace(['"', '\r', '\n'], "");
    let response = Response::builder()
        .header(header::CONTENT_TYPE, download.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{safe_name}\""),
        )
        .body(body)
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                "Failed to build download response",
                e,
            )
        })?;
    Ok(response)
}

/// POST /api/admin/files/download-many
pub async fn admin_download_many(
    State(state): State<AppState>,
    _session: AdminSession,
    Json(req): Json<FileIdsRequest>,
) -> ApiResult<Json<DownloadsResponse>> {
    let downloads = state.catalog.download_many(&req.file_ids).await?;
    Ok(Json(DownloadsResponse { downloads }))
}

/// POST /api/admin/files/delete-many
pub async fn admin_delete_many(
    State(state): State<AppState>,
    _session: AdminSession,
    Json(req): Json<FileIdsRequest>,
) -> ApiResult<Json<DeletedResponse>> {
    let deleted_count = state.catalog.delete_many(&req.file_ids).await?;
    Ok(Json(DeletedResponse { deleted_count }))
}

/// POST /api/admin/copy-string
pub async fn admin_copy_string(
    State(state): State<AppState>,
    session: AdminSession,
    Json(req): Json<FileIdsRequest>,
) -> ApiResult<Json<CopyStringResponse>> {
    let text = state
        .catalog
        .copy_string(&req.file_ids, &session.admin.username)
        .await?;
    Ok(Json(CopyStringResponse { text }))
}
