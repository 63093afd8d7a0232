//! Data directory configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Location of all persisted state.
///
/// Collection documents live directly under `data_dir`; uploaded blobs
/// live under `data_dir/files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root directory for all runtime data.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl DataConfig {
    /// The directory holding collection documents.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// The directory holding uploaded file blobs.
    pub fn files_path(&self) -> PathBuf {
        self.data_path().join("files")
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}
