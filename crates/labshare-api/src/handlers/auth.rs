//! Auth handlers — admin login, logout, me.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use labshare_auth::{SESSION_COOKIE_NAME, SESSION_TTL_HOURS};
use labshare_entity::{Admin, AdminSummary};

use crate::error::ApiResult;
use crate::extractors::AdminSession;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Wrapper around the admin account view.
#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub admin: AdminSummary,
}

/// Logout acknowledgement.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::hours(SESSION_TTL_HOURS))
        .build()
}

fn admin_response(admin: &Admin) -> Json<AdminResponse> {
    Json(AdminResponse {
        admin: admin.summary(),
    })
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AdminResponse>)> {
    let admin = state
        .sessions
        .authenticate(&req.username, &req.password)
        .await?;
    let token = state.sessions.create_session(&admin).await?;

    Ok((jar.add(session_cookie(token)), admin_response(&admin)))
}

/// POST /api/admin/logout
///
/// Deletes the presented session if there is one; always clears the
/// cookie. Logging out without a valid session is not an error.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<OkResponse>)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state.sessions.logout(cookie.value()).await?;
    }

    let removal = Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build();
    Ok((jar.remove(removal), Json(OkResponse { ok: true })))
}

/// GET /api/admin/me
pub async fn me(session: AdminSession) -> Json<AdminResponse> {
    admin_response(&session.admin)
}
