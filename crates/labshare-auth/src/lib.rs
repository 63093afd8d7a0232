//! # labshare-auth
//!
//! Credential verification and the session-backed authentication state
//! machine: PBKDF2 password hashing, session issuance/validation with
//! lazy expiry sweeps, and admin account management with the
//! last-active-admin floor.

pub mod admins;
pub mod password;
pub mod session;

pub use admins::{AdminDirectory, AdminPatch};
pub use password::PasswordHasher;
pub use session::{SESSION_COOKIE_NAME, SESSION_TTL_HOURS, SessionManager};
