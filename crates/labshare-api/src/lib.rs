//! # labshare-api
//!
//! HTTP API layer for LabShare built on Axum.
//!
//! Provides the REST endpoints, the session-cookie extractor, error
//! mapping, CORS and request tracing, and the server bootstrap.

pub mod app;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use app::run_server;
pub use state::AppState;
