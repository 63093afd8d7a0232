//! RFC 3339 timestamp helpers.
//!
//! Collection documents store timestamps as strings. Data files may
//! predate this implementation (or have been hand-edited), so parsing is
//! lenient: a malformed timestamp yields `None` rather than failing the
//! whole document. Callers decide what `None` means — an unparseable
//! session expiry counts as expired, an unparseable file creation time is
//! never considered old enough to purge.

use chrono::{DateTime, NaiveDateTime, Utc};

/// The current UTC time as an RFC 3339 string.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Parse an RFC 3339 timestamp, tolerating a missing offset (assumed UTC).
///
/// Returns `None` for empty or malformed input.
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive timestamps (no offset) are treated as UTC.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
