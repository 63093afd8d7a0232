//! # labshare-service
//!
//! Domain services over the document store: uploader identity
//! resolution, the upload ingestion pipeline, the admin file catalog,
//! and runtime settings management.

pub mod catalog;
pub mod ingest;
pub mod settings;
pub mod uploader;

pub use catalog::CatalogService;
pub use ingest::{BatchIngest, IngestService};
pub use settings::{SettingsPatch, SettingsService};
pub use uploader::{UploaderDirectory, UploaderPatch};
