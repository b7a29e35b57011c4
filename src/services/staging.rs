use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::storage::StorageService;

/// Request-scoped local copy of one remote object
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub source_key: String,
    pub local_path: PathBuf,
    /// Final path segment of `source_key`
    pub basename: String,
    pub size: u64,
}

/// Final `/`-separated segment of an object key.
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Local staging name for the `index`-th key. The index prefix keeps keys that
/// share a basename from landing on the same file.
pub fn staging_name(index: usize, key: &str) -> String {
    format!("{:04}_{}", index, basename(key))
}

/// Unique per-request scratch directory. Everything inside is removed when the
/// area is dropped or explicitly cleaned up.
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    pub fn new(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create scratch root {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix("merge-")
            .tempdir_in(root)
            .with_context(|| format!("Failed to create scratch directory in {}", root.display()))?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Fetch every key into the scratch directory, strictly in order.
    ///
    /// The first failure aborts staging; keys after it are never fetched.
    pub async fn stage(
        &self,
        storage: &dyn StorageService,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<StagedFile>> {
        let mut staged = Vec::with_capacity(keys.len());

        for (index, key) in keys.iter().enumerate() {
            if cancel.is_cancelled() {
                bail!("Request cancelled before fetching {}", key);
            }

            let local_path = self.dir.path().join(staging_name(index, key));
            let size = tokio::select! {
                res = storage.download_to_path(key, &local_path) => {
                    res.with_context(|| format!("Failed to stage {}", key))?
                }
                _ = cancel.cancelled() => bail!("Request cancelled while fetching {}", key),
            };

            info!("📥 Staged {} ({} bytes) [{}/{}]", key, size, index + 1, keys.len());
            staged.push(StagedFile {
                source_key: key.clone(),
                local_path,
                basename: basename(key).to_string(),
                size,
            });
        }

        Ok(staged)
    }

    /// Remove the scratch directory now. Failures are logged, never propagated.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!("Removed scratch directory {}", path.display()),
            Err(e) => warn!("Failed to remove scratch directory {}: {}", path.display(), e),
        }
    }
}
