//! Scheme-based routing to storage backends.

use crate::error::{CatalogError, Result};
use crate::models::{FileMetadata, ObjectVersion};
use crate::ports::{ProgressFn, StoragePort};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::fs_storage::FilesystemStorage;

/// Extract the URI scheme, or `None` for plain paths.
///
/// Single-letter "schemes" are treated as Windows drive letters
/// (`C:\data\file.csv`), not URI schemes.
pub fn parse_uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    if scheme.len() <= 1 {
        return None;
    }
    if !scheme
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    Some(scheme)
}

/// [`StoragePort`] that dispatches on URI scheme.
///
/// A backend registered under `None` handles schemeless sources (plain
/// filesystem paths). `file://` URIs have their scheme prefix stripped
/// before delegation so the filesystem backend sees an ordinary path.
pub struct RouterStorage {
    backends: HashMap<Option<String>, Arc<dyn StoragePort>>,
}

impl RouterStorage {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Router with the local filesystem handling both plain paths and
    /// `file://` URIs.
    pub fn with_filesystem_defaults() -> Self {
        let fs: Arc<dyn StoragePort> = Arc::new(FilesystemStorage::new());
        Self::new()
            .register(None, Arc::clone(&fs))
            .register(Some("file"), fs)
    }

    pub fn register(mut self, scheme: Option<&str>, backend: Arc<dyn StoragePort>) -> Self {
        self.backends.insert(scheme.map(str::to_string), backend);
        self
    }

    /// Resolve a source URI to its backend and the path the backend
    /// should operate on.
    fn resolve<'a>(&self, uri: &'a str) -> Result<(&Arc<dyn StoragePort>, &'a str)> {
        let scheme = parse_uri_scheme(uri);
        let backend = self
            .backends
            .get(&scheme.map(str::to_string))
            .ok_or_else(|| CatalogError::Configuration {
                message: match scheme {
                    Some(s) => format!("no storage backend registered for scheme '{s}'"),
                    None => "no storage backend registered for plain paths".to_string(),
                },
            })?;

        let stripped = match scheme {
            Some("file") => uri
                .strip_prefix("file://")
                .or_else(|| uri.strip_prefix("file:"))
                .unwrap_or(uri),
            _ => uri,
        };
        Ok((backend, stripped))
    }
}

impl Default for RouterStorage {
    fn default() -> Self {
        Self::with_filesystem_defaults()
    }
}

impl StoragePort for RouterStorage {
    fn head(&self, source: &str) -> Result<FileMetadata> {
        let (backend, path) = self.resolve(source)?;
        backend.head(path)
    }

    fn download(&self, source: &str, dest: &Path, progress: &ProgressFn) -> Result<()> {
        let (backend, path) = self.resolve(source)?;
        backend.download(path, dest, progress)
    }

    fn upload(&self, local: &Path, dest: &str, progress: Option<&ProgressFn>) -> Result<()> {
        let (backend, path) = self.resolve(dest)?;
        backend.upload(local, path, progress)
    }

    fn list(&self, prefix: &str, pattern: Option<&str>) -> Result<Vec<String>> {
        let (backend, path) = self.resolve(prefix)?;
        backend.list(path, pattern)
    }

    fn list_versions(&self, source: &str, limit: Option<usize>) -> Result<Vec<ObjectVersion>> {
        let (backend, path) = self.resolve(source)?;
        backend.list_versions(path, limit)
    }

    fn head_version(&self, source: &str, version_id: &str) -> Result<FileMetadata> {
        let (backend, path) = self.resolve(source)?;
        backend.head_version(path, version_id)
    }

    fn download_version(
        &self,
        source: &str,
        dest: &Path,
        version_id: &str,
        progress: &ProgressFn,
    ) -> Result<()> {
        let (backend, path) = self.resolve(source)?;
        backend.download_version(path, dest, version_id, progress)
    }
}
