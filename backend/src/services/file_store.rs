use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::utils::validators::UPLOAD_PREFIX;

/// Storage collaborator that owns uploaded certificate files. The core only
/// ever stores references; removal is the one operation it drives.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Remove the file behind a stored reference. References that do not
    /// point into this store are ignored.
    async fn remove(&self, reference: &str) -> Result<()>;
}

/// Attempt removal and log the outcome; never fails the caller.
pub async fn remove_best_effort(store: &dyn FileStore, reference: &str) {
    match store.remove(reference).await {
        Ok(()) => log::info!("🗑️  Removed uploaded file {}", reference),
        Err(e) => log::warn!("⚠️  Failed to remove uploaded file {}: {}", reference, e),
    }
}

/// Files kept on local disk under the configured upload directory
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map `/uploads/<name>` to a path inside the root, refusing traversal
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference.strip_prefix(UPLOAD_PREFIX)?);

        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn remove(&self, reference: &str) -> Result<()> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("{}: {}", path.display(), e)),
        }
    }
}
