//! # labshare-core
//!
//! Core crate for LabShare. Contains configuration schemas, time helpers,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other LabShare crates.

pub mod config;
pub mod error;
pub mod ids;
pub mod result;
pub mod time;

pub use error::AppError;
pub use result::AppResult;
