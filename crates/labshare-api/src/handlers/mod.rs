//! HTTP request handlers, grouped by surface.

pub mod admin;
pub mod auth;
pub mod health;
pub mod uploads;
