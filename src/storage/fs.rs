//! Filesystem storage backend.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TemplateError};
use crate::storage::Storage;

/// Writes each artifact to a file under a base directory.
///
/// The key is joined with the base directory; intermediate directories are
/// created as needed. Keys that would resolve outside the base directory are
/// refused.
///
/// ```rust,no_run
/// use safe_template::FsStorage;
///
/// let storage = FsStorage::new("/var/www/gadgets");
/// ```
pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    /// Create a storage writing under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl Storage for FsStorage {
    async fn put(&self, key: &str, content: &[u8], _content_type: &str) -> Result<()> {
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            let err = io::Error::new(io::ErrorKind::InvalidInput, format!("bad key {key:?}"));
            return Err(TemplateError::StorageWrite(Box::new(err)));
        }
        let path = self.base_dir.join(relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TemplateError::StorageWrite(Box::new(e)))?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| TemplateError::StorageWrite(Box::new(e)))?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}
