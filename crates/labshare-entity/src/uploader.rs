//! Contributor (uploader) records.
//!
//! An uploader is a contributor identity — display name plus grade and
//! groups — distinct from an administrator. Uploaders are never hard
//! deleted; disabling one clears `is_active_for_upload` and keeps the
//! record for history.

use serde::{Deserialize, Serialize};

/// Lowest grade allowed to submit uploads.
pub const MIN_GRADE: u8 = 7;
/// Highest grade allowed to submit uploads.
pub const MAX_GRADE: u8 = 12;

/// A contributor record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uploader {
    /// Unique uploader identifier.
    pub id: String,
    /// Name as entered by the contributor.
    pub display_name: String,
    /// Trimmed, lowercased name used for uniqueness.
    pub normalized_name: String,
    /// School grade, 7–12. Absent for records imported without one;
    /// such uploaders cannot be attributed new uploads until a grade is
    /// supplied.
    #[serde(default)]
    pub grade: Option<u8>,
    /// Additional group memberships beyond the grade.
    #[serde(default)]
    pub extra_groups: Vec<String>,
    /// Whether new uploads may be attributed to this name.
    #[serde(default = "default_true")]
    pub is_active_for_upload: bool,
    /// When the record was created (RFC 3339).
    pub created_at: String,
    /// When the record was last modified (RFC 3339).
    pub updated_at: String,
}

/// The `uploaders` collection document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadersDoc {
    /// All uploader records, including disabled ones.
    #[serde(default)]
    pub uploaders: Vec<Uploader>,
}

impl UploadersDoc {
    /// Find an uploader by normalized name.
    pub fn find_by_normalized_name(&self, normalized: &str) -> Option<&Uploader> {
        self.uploaders
            .iter()
            .find(|u| u.normalized_name == normalized)
    }

    /// Find an uploader by id.
    pub fn find_by_id(&self, id: &str) -> Option<&Uploader> {
        self.uploaders.iter().find(|u| u.id == id)
    }
}

/// Normalize a display name for uniqueness lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parse a grade value, returning `None` unless it falls in 7–12.
pub fn parse_grade(value: Option<i64>) -> Option<u8> {
    match value {
        Some(grade) if (MIN_GRADE as i64..=MAX_GRADE as i64).contains(&grade) => Some(grade as u8),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bounds() {
        assert_eq!(parse_grade(Some(7)), Some(7));
        assert_eq!(parse_grade(Some(12)), Some(12));
        assert_eq!(parse_grade(Some(6)), None);
        assert_eq!(parse_grade(Some(13)), None);
        assert_eq!(parse_grade(None), None);
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_name("  Tom Sawyer "), "tom sawyer");
    }
}
