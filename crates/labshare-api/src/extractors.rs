//! `AdminSession` extractor — pulls the session cookie, validates it, and
//! injects the authenticated admin into the handler.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use labshare_auth::SESSION_COOKIE_NAME;
use labshare_entity::Admin;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated admin for the current request.
///
/// Extraction fails with the uniform unauthorized error when the cookie
/// is missing, the session is unknown or expired, or the admin account
/// has been deactivated or removed.
#[derive(Debug, Clone)]
pub struct AdminSession {
    /// The validated admin account.
    pub admin: Admin,
    /// The raw session token, kept for logout.
    pub token: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string());

        let admin = state.sessions.validate(token.as_deref()).await?;
        Ok(Self {
            admin,
            token: token.unwrap_or_default(),
        })
    }
}
