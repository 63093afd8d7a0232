//! Legacy group data, carried as an opaque blob.

use serde::{Deserialize, Serialize};

/// The `groups` collection document.
///
/// Written once by the legacy import and otherwise untouched; the store
/// passes it through without interpreting its structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupsDoc(pub serde_json::Value);

impl Default for GroupsDoc {
    fn default() -> Self {
        Self(serde_json::json!({ "groups": {} }))
    }
}
