//! Media catalog lookups
//!
//! The hub needs album and title information the queue does not carry. The
//! catalog is read synchronously because queue events are delivered on the
//! worker task without an async context to await on.

use anyhow::{Context, Result};
use gallery_core::models::MediaObjectInfo;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

pub trait MediaCatalog: Send + Sync {
    /// Look up a media object. `Ok(None)` when it does not exist.
    fn media_object(&self, id: i32) -> Result<Option<MediaObjectInfo>>;
}

/// Catalog held in memory, optionally seeded from a JSON manifest.
#[derive(Default)]
pub struct InMemoryMediaCatalog {
    objects: RwLock<HashMap<i32, MediaObjectInfo>>,
}

impl InMemoryMediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: impl IntoIterator<Item = MediaObjectInfo>) -> Self {
        let catalog = Self::new();
        for object in objects {
            catalog.insert(object);
        }
        catalog
    }

    /// Load a manifest: a JSON array of media objects.
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read media catalog {}", path.display()))?;
        let objects: Vec<MediaObjectInfo> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid media catalog {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            count = objects.len(),
            "Media catalog loaded"
        );
        Ok(Self::with_objects(objects))
    }

    pub fn insert(&self, object: MediaObjectInfo) {
        let mut objects = match self.objects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        objects.insert(object.id, object);
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MediaCatalog for InMemoryMediaCatalog {
    fn media_object(&self, id: i32) -> Result<Option<MediaObjectInfo>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| anyhow::anyhow!("media catalog lock poisoned"))?;
        Ok(objects.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn object(id: i32) -> MediaObjectInfo {
        MediaObjectInfo {
            id,
            album_id: 3,
            title: format!("Clip {}", id),
            original_path: format!("/media/album3/clip{}.mov", id),
        }
    }

    #[test]
    fn test_lookup() {
        let catalog = InMemoryMediaCatalog::with_objects([object(1), object(2)]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.media_object(2).unwrap(), Some(object(2)));
        assert_eq!(catalog.media_object(9).unwrap(), None);
    }

    #[test]
    fn test_from_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":5,"album_id":1,"title":"Beach","original_path":"/media/beach.mp4"}}]"#
        )
        .unwrap();

        let catalog = InMemoryMediaCatalog::from_manifest(file.path()).unwrap();
        let beach = catalog.media_object(5).unwrap().unwrap();
        assert_eq!(beach.title, "Beach");
        assert_eq!(beach.album_id, 1);
    }

    #[test]
    fn test_from_manifest_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(InMemoryMediaCatalog::from_manifest(file.path()).is_err());
    }
}
