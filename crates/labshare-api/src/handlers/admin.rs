//! Admin management handlers — settings, admin accounts, uploader records.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use labshare_auth::AdminPatch;
use labshare_entity::{AdminSummary, Settings, Uploader};
use labshare_service::{SettingsPatch, UploaderPatch};

use crate::error::ApiResult;
use crate::extractors::AdminSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUploaderRequest {
    pub display_name: Option<String>,
    pub grade: Option<i64>,
    pub extra_groups: Option<Vec<String>>,
    pub is_active_for_upload: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
}

#[derive(Debug, Serialize)]
pub struct AdminsResponse {
    pub admins: Vec<AdminSummary>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub admin: AdminSummary,
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
pub struct OkResponse {
    pub ok: bool,
}

/// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<AppState>,
    _session: AdminSession,
) -> ApiResult<Json<SettingsResponse>> {
    let settings = state.settings.get().await?;
    Ok(Json(SettingsResponse { settings }))
}

/// PUT /api/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    _session: AdminSession,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<SettingsResponse>> {
    let settings = state.settings.update(patch).await?;
    Ok(Json(SettingsResponse { settings }))
}

/// GET /api/admin/users
pub async fn list_admins(
    State(state): State<AppState>,
    _session: AdminSession,
) -> ApiResult<Json<AdminsResponse>> {
    let admins = state.admins.list().await?;
    Ok(Json(AdminsResponse { admins }))
}

/// POST /api/admin/users
pub async fn create_admin(
    State(state): State<AppState>,
    _session: AdminSession,
    Json(req): Json<CreateAdminRequest>,
) -> ApiResult<Json<AdminResponse>> {
    let admin = state.admins.create(&req.username, &req.password).await?;
    Ok(Json(AdminResponse { admin }))
}

/// PATCH /api/admin/users/{admin_id}
pub async fn update_admin(
    State(state): State<AppState>,
    session: AdminSession,
    Path(admin_id): Path<String>,
    Json(req): Json<UpdateAdminRequest>,
) -> ApiResult<Json<AdminResponse>> {
    let patch = AdminPatch {
        password: req.password,
        is_active: req.is_active,
    };
    let admin = state
        .admins
        .update(&admin_id, &session.admin.id, patch)
        .await?;
    Ok(Json(AdminResponse { admin }))
}

/// DELETE /api/admin/users/{admin_id}
pub async fn delete_admin(
    State(state): State<AppState>,
    session: AdminSession,
    Path(admin_id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    state.admins.delete(&admin_id, &session.admin.id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /api/admin/uploaders — all uploader records, disabled included.
pub async fn list_uploaders(
    State(state): State<AppState>,
    _session: AdminSession,
) -> ApiResult<Json<UploadersResponse>> {
    let uploaders = state.uploaders.list_all().await?;
    Ok(Json(UploadersResponse { uploaders }))
}

/// PATCH /api/admin/uploaders/{uploader_id}
pub async fn update_uploader(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(uploader_id): Path<String>,
    Json(req): Json<UpdateUploaderRequest>,
) -> ApiResult<Json<UploaderResponse>> {
    let patch = UploaderPatch {
        display_name: req.display_name,
        grade: req.grade,
        extra_groups: req.extra_groups,
        is_active_for_upload: req.is_active_for_upload,
    };
    let uploader = state.uploaders.update(&uploader_id, patch).await?;
    Ok(Json(UploaderResponse { uploader }))
}

/// DELETE /api/admin/uploaders/{uploader_id} — disable, never remove.
pub async fn disable_uploader(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(uploader_id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    state.uploaders.disable(&uploader_id).await?;
    Ok(Json(OkResponse { ok: true }))
}
