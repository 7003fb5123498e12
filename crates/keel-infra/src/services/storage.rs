use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keel_core::{CoreError, Disposable, ServiceResult};
use parking_lot::RwLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AdapterError, AdapterResult, IntoServiceResult};

/// Default root directory of [`LocalFileStorage`]
pub const DEFAULT_STORAGE_ROOT: &str = "./storage";

/// File storage capability addressed by `/`-separated relative paths
#[async_trait]
pub trait FileStorage: Disposable {
    async fn put(&self, path: &str, data: &[u8]) -> ServiceResult<()>;

    /// File contents; fails with `NOT_FOUND` when absent
    async fn get(&self, path: &str) -> ServiceResult<Vec<u8>>;

    /// Remove a file, reporting whether it existed
    async fn delete(&self, path: &str) -> ServiceResult<bool>;

    async fn exists(&self, path: &str) -> ServiceResult<bool>;

    /// Paths under `prefix`, sorted
    async fn list(&self, prefix: &str) -> ServiceResult<Vec<String>>;
}

/// Normalise a storage path, dropping empty, `.` and `..` segments
pub fn sanitize_path(path: &str) -> AdapterResult<String> {
    let normalized = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/");

    if normalized.is_empty() {
        return Err(AdapterError::InvalidInput(format!("'{}' is not a file path", path)));
    }
    Ok(normalized)
}

/// Files under a root directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> AdapterResult<PathBuf> {
        Ok(self.root.join(sanitize_path(path)?))
    }

    async fn write(&self, path: &str, data: &[u8]) -> AdapterResult<()> {
        let full_path = self.full_path(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        tracing::debug!(path = %full_path.display(), bytes = data.len(), "Stored file");
        Ok(())
    }

    async fn read(&self, path: &str) -> AdapterResult<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AdapterError::NotFound(path.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, path: &str) -> AdapterResult<bool> {
        let full_path = self.full_path(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn walk(&self, prefix: &str) -> AdapterResult<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if relative.starts_with(prefix) {
                        found.push(relative);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, path: &str, data: &[u8]) -> ServiceResult<()> {
        self.write(path, data).await.into_service_result()
    }

    async fn get(&self, path: &str) -> ServiceResult<Vec<u8>> {
        self.read(path).await.into_service_result()
    }

    async fn delete(&self, path: &str) -> ServiceResult<bool> {
        self.remove(path).await.into_service_result()
    }

    async fn exists(&self, path: &str) -> ServiceResult<bool> {
        match self.full_path(path) {
            Ok(full_path) => ServiceResult::ok_with(fs::metadata(full_path).await.is_ok()),
            Err(err) => err.into(),
        }
    }

    async fn list(&self, prefix: &str) -> ServiceResult<Vec<String>> {
        self.walk(prefix).await.into_service_result()
    }
}

#[async_trait]
impl Disposable for LocalFileStorage {
    async fn dispose(&self) -> Result<(), CoreError> {
        // Writes are synced as they happen; nothing is buffered.
        tracing::debug!(root = %self.root.display(), "Released local file storage");
        Ok(())
    }
}

/// Files kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryFileStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn put(&self, path: &str, data: &[u8]) -> ServiceResult<()> {
        sanitize_path(path)
            .map(|path| {
                self.files.write().insert(path, data.to_vec());
            })
            .into_service_result()
    }

    async fn get(&self, path: &str) -> ServiceResult<Vec<u8>> {
        sanitize_path(path)
            .and_then(|key| {
                self.files
                    .read()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| AdapterError::NotFound(path.to_string()))
            })
            .into_service_result()
    }

    async fn delete(&self, path: &str) -> ServiceResult<bool> {
        sanitize_path(path)
            .map(|key| self.files.write().remove(&key).is_some())
            .into_service_result()
    }

    async fn exists(&self, path: &str) -> ServiceResult<bool> {
        sanitize_path(path)
            .map(|key| self.files.read().contains_key(&key))
            .into_service_result()
    }

    async fn list(&self, prefix: &str) -> ServiceResult<Vec<String>> {
        let files: Vec<String> = self
            .files
            .read()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        ServiceResult::ok_with(files)
    }
}

#[async_trait]
impl Disposable for InMemoryFileStorage {
    async fn dispose(&self) -> Result<(), CoreError> {
        self.files.write().clear();
        Ok(())
    }
}
