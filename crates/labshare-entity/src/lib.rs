//! # labshare-entity
//!
//! Typed records for every persisted collection, with explicit serde
//! (de)serialization. The JSON shapes match the documents the original
//! deployment wrote, so existing data files load unchanged.

pub mod admin;
pub mod group;
pub mod session;
pub mod settings;
pub mod upload;
pub mod uploader;

pub use admin::{Admin, AdminSummary, AdminsDoc};
pub use group::GroupsDoc;
pub use session::{Session, SessionsDoc};
pub use settings::{Settings, UploadAccessMode};
pub use upload::{FileLifecycle, UploadBatch, UploadedFile, UploadsDoc};
pub use uploader::{Uploader, UploadersDoc, normalize_name, parse_grade};
