//! # labshare-worker
//!
//! Background maintenance for the file store. Currently one job: the
//! retention daemon, which periodically soft-deletes files older than
//! the configured retention window and removes their blobs.

pub mod retention;

pub use retention::{retention_daemon, run_retention_sweep};
