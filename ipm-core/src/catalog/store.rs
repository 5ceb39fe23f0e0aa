//! Registry persistence
//!
//! Loads and saves the [`LocalRegistry`] through a [`RegistryStorage`]
//! collaborator. A missing registry file reads as an empty registry.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::lock::LocalRegistry;
use crate::error::{IpmError, IpmResult};

/// Raw file access used by the registry service
#[async_trait]
pub trait RegistryStorage: Send + Sync {
    /// Read a whole file, `Ok(None)` when it does not exist
    async fn read_file(&self, path: &Path) -> IpmResult<Option<Vec<u8>>>;

    /// Replace a file so readers never observe a partial write
    async fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> IpmResult<()>;
}

/// Local filesystem storage
///
/// Writes go to a temporary file in the destination directory which is then
/// renamed over the target.
#[derive(Debug, Clone, Default)]
pub struct FsStorage;

#[async_trait]
impl RegistryStorage for FsStorage {
    async fn read_file(&self, path: &Path) -> IpmResult<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IpmError::filesystem(path, e)),
        }
    }

    async fn write_file_atomic(&self, path: &Path, bytes: &[u8]) -> IpmResult<()> {
        let target = path.to_path_buf();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &bytes))
            .await
            .map_err(|e| IpmError::filesystem(path, std::io::Error::other(e)))?
    }
}

fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> IpmResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| IpmError::filesystem(&parent, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)
        .map_err(|e| IpmError::filesystem(&parent, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| IpmError::filesystem(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| IpmError::filesystem(path, e.error))?;

    Ok(())
}

/// Loads and saves the local registry file
pub struct RegistryService<S: RegistryStorage> {
    storage: S,
    path: PathBuf,
}

impl RegistryService<FsStorage> {
    /// Registry service backed by the local filesystem
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self::new(FsStorage, path)
    }
}

impl<S: RegistryStorage> RegistryService<S> {
    pub fn new(storage: S, path: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }

    /// Path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry, treating a missing file as empty
    pub async fn load(&self) -> IpmResult<LocalRegistry> {
        match self.storage.read_file(&self.path).await? {
            Some(bytes) => {
                let registry = LocalRegistry::from_json(&self.path, &bytes)?;
                tracing::debug!(
                    "Loaded registry {} ({} records)",
                    self.path.display(),
                    registry.len()
                );
                Ok(registry)
            }
            None => {
                tracing::debug!("No registry at {}, starting empty", self.path.display());
                Ok(LocalRegistry::new())
            }
        }
    }

    /// Persist the registry atomically
    pub async fn save(&self, registry: &LocalRegistry) -> IpmResult<()> {
        let bytes = registry.to_json().map_err(|e| IpmError::RegistryCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        self.storage.write_file_atomic(&self.path, &bytes).await?;
        tracing::debug!(
            "Saved registry {} ({} records)",
            self.path.display(),
            registry.len()
        );
        Ok(())
    }
}
