//! Physical deletion of a dropped table's data and metadata.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::entry::DroppedTableEntry;

/// Capability that removes everything a dropped table left on disk.
///
/// Implementations must be idempotent: deleting something that is already
/// gone succeeds. The reclaimer runs each call to completion on its own task
/// and keeps the entry `Reclaiming` until the call returns, even past the
/// delete timeout, so an implementation never races a later undrop.
#[async_trait]
pub trait PhysicalDelete: Send + Sync {
    async fn delete(&self, entry: &DroppedTableEntry) -> Result<()>;
}

/// Deletes dropped tables from the local filesystem.
///
/// With a `root` set, a table's data lives under
/// `<root>/store/<first 3 chars of uuid>/<uuid>` and relative metadata paths
/// are resolved against `root`. Data is removed before metadata, so a delete
/// that fails halfway leaves the metadata file for startup recovery to find.
#[derive(Debug, Clone, Default)]
pub struct FsDeleter {
    root: Option<PathBuf>,
}

impl FsDeleter {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, metadata_path: &str) -> PathBuf {
        let path = Path::new(metadata_path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Data directory of a table, when a root is configured.
    pub fn data_dir(&self, entry: &DroppedTableEntry) -> Option<PathBuf> {
        let uuid = entry.uuid().to_string();
        self.root
            .as_ref()
            .map(|root| root.join("store").join(&uuid[..3]).join(&uuid))
    }
}

#[async_trait]
impl PhysicalDelete for FsDeleter {
    async fn delete(&self, entry: &DroppedTableEntry) -> Result<()> {
        if entry.metadata_path().is_empty() {
            anyhow::bail!("refusing to delete an empty metadata path");
        }

        if let Some(data_dir) = self.data_dir(entry) {
            remove_path(&data_dir).await?;
        }
        remove_path(&self.resolve(entry.metadata_path())).await
    }
}

/// Remove a file or directory tree. A missing path counts as removed.
async fn remove_path(path: &Path) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Already deleted");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
        }
    };

    let removed = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match removed {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Deleted dropped table files");
            Ok(())
        }
        // Someone else removed it between the stat and the delete
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
    }
}
