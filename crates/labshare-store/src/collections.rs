//! Named collections the store knows how to persist.

use serde::Serialize;
use serde::de::DeserializeOwned;

use labshare_entity::{AdminsDoc, GroupsDoc, SessionsDoc, Settings, UploadersDoc, UploadsDoc};

/// A document type persisted as `<data_dir>/<NAME>.json`.
///
/// `Default` supplies the payload a missing collection file is
/// materialized with on first access.
pub trait Collection: Serialize + DeserializeOwned + Default + Send + 'static {
    /// File stem of the collection document.
    const NAME: &'static str;
}

impl Collection for AdminsDoc {
    const NAME: &'static str = "admins";
}

impl Collection for SessionsDoc {
    const NAME: &'static str = "sessions";
}

impl Collection for UploadersDoc {
    const NAME: &'static str = "uploaders";
}

impl Collection for UploadsDoc {
    const NAME: &'static str = "uploads";
}

impl Collection for Settings {
    const NAME: &'static str = "settings";
}

impl Collection for GroupsDoc {
    const NAME: &'static str = "groups";
}
