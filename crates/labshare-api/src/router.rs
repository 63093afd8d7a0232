//! Route definitions for the LabShare HTTP API.
//!
//! All routes are mounted under `/api`. The router receives `AppState`
//! and passes it to every handler via Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use labshare_core::config::server::CorsConfig;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(public_routes())
        .merge(auth_routes())
        .merge(catalog_routes())
        .merge(management_routes());

    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Public endpoints: health, uploader picker, batch submission.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/uploaders", get(handlers::uploads::list_uploaders))
        .route("/uploaders", post(handlers::uploads::create_uploader))
        .route(
            "/upload-batches",
            post(handlers::uploads::create_upload_batch)
                // Uploads are size-limited per file while streaming, not by
                // a whole-body cap.
                .layer(DefaultBodyLimit::disable()),
        )
}

/// Session endpoints: login, logout, me.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(handlers::auth::login))
        .route("/admin/logout", post(handlers::auth::logout))
        .route("/admin/me", get(handlers::auth::me))
}

/// Admin file catalog: view, download, bulk delete, copy string.
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/uploads", get(handlers::uploads::admin_uploads))
        .route(
            "/admin/files/{file_id}/download",
            get(handlers::uploads::admin_download_file),
        )
        .route(
            "/admin/files/download-many",
            post(handlers::uploads::admin_download_many),
        )
        .route(
            "/admin/files/delete-many",
            post(handlers::uploads::admin_delete_many),
        )
        .route(
            "/admin/copy-string",
            post(handlers::uploads::admin_copy_string),
        )
}

/// Admin management: settings, admin accounts, uploader records.
fn management_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/settings", get(handlers::admin::get_settings))
        .route("/admin/settings", put(handlers::admin::update_settings))
        .route("/admin/users", get(handlers::admin::list_admins))
        .route("/admin/users", post(handlers::admin::create_admin))
        .route(
            "/admin/users/{admin_id}",
            patch(handlers::admin::update_admin),
        )
        .route(
            "/admin/users/{admin_id}",
            delete(handlers::admin::delete_admin),
        )
        .route("/admin/uploaders", get(handlers::admin::list_uploaders))
        .route(
            "/admin/uploaders/{uploader_id}",
            patch(handlers::admin::update_uploader),
        )
        .route(
            "/admin/uploaders/{uploader_id}",
            delete(handlers::admin::disable_uploader),
        )
}

/// Builds the CORS tower layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ]);

    if config.allowed_origins.contains(&"*".to_string()) {
        // Wildcards cannot be combined with credentials.
        layer = layer.allow_origin(Any).allow_headers(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer = layer
            .allow_origin(origins)
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true);
    }
    layer
}
