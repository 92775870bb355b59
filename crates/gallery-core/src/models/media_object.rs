use serde::{Deserialize, Serialize};

/// Catalog view of a gallery media object, as needed to render queue items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaObjectInfo {
    pub id: i32,
    pub album_id: i32,
    pub title: String,
    /// Path of the original file on disk, read by the conversion handler.
    pub original_path: String,
}
