//! Local-filesystem storage backend.

use crate::config::CacheConfig;
use crate::error::{CatalogError, Result};
use crate::glob::glob_to_regex;
use crate::models::{FileMetadata, ObjectVersion};
use crate::ports::{ProgressFn, StoragePort};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// [`StoragePort`] backed by the local filesystem.
///
/// `etag` is the quoted sha256 hex digest of file contents, so any content
/// change invalidates freshness even when the mtime is preserved. Object
/// versioning is not a filesystem concept; the version operations fail with
/// [`CatalogError::VersioningNotSupported`].
pub struct FilesystemStorage;

impl FilesystemStorage {
    pub fn new() -> Self {
        Self
    }

    fn map_io(err: std::io::Error, source: &str) -> CatalogError {
        match err.kind() {
            std::io::ErrorKind::NotFound => CatalogError::StorageNotFound {
                source_uri: source.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => CatalogError::StorageAccessDenied {
                source_uri: source.to_string(),
            },
            _ => CatalogError::Storage {
                message: err.to_string(),
                source_uri: source.to_string(),
            },
        }
    }

    fn content_digest(path: &Path, source: &str) -> Result<String> {
        let mut file = File::open(path).map_err(|e| Self::map_io(e, source))?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CacheConfig::COPY_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|e| Self::map_io(e, source))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("\"{}\"", hex::encode(hasher.finalize())))
    }

    fn copy_with_progress(
        src: &Path,
        dest: &Path,
        source_label: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<u64> {
        let total = fs::metadata(src)
            .map_err(|e| Self::map_io(e, source_label))?
            .len();
        let mut reader = File::open(src).map_err(|e| Self::map_io(e, source_label))?;
        let mut writer = File::create(dest).map_err(|e| CatalogError::io_with_path(e, dest))?;

        let mut buf = vec![0u8; CacheConfig::COPY_CHUNK_SIZE];
        let mut copied: u64 = 0;
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| Self::map_io(e, source_label))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .map_err(|e| CatalogError::io_with_path(e, dest))?;
            copied += n as u64;
            if let Some(report) = progress {
                report(copied, total);
            }
        }
        writer
            .sync_all()
            .map_err(|e| CatalogError::io_with_path(e, dest))?;
        Ok(copied)
    }
}

impl Default for FilesystemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for FilesystemStorage {
    fn head(&self, source: &str) -> Result<FileMetadata> {
        let path = Path::new(source);
        let meta = fs::metadata(path).map_err(|e| Self::map_io(e, source))?;
        if !meta.is_file() {
            return Err(CatalogError::Storage {
                message: "not a regular file".to_string(),
                source_uri: source.to_string(),
            });
        }

        let last_modified = meta
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        let etag = Self::content_digest(path, source)?;

        FileMetadata::new(Some(etag), last_modified, Some(meta.len()))
    }

    fn download(&self, source: &str, dest: &Path, progress: &ProgressFn) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io_with_path(e, parent))?;
        }
        let copied = Self::copy_with_progress(Path::new(source), dest, source, Some(progress))?;
        debug!(source, dest = %dest.display(), bytes = copied, "downloaded");
        Ok(())
    }

    fn upload(&self, local: &Path, dest: &str, progress: Option<&ProgressFn>) -> Result<()> {
        if !local.is_file() {
            return Err(CatalogError::FileNotFound(local.to_path_buf()));
        }
        let dest_path = Path::new(dest);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io_with_path(e, parent))?;
        }
        let local_label = local.to_string_lossy();
        let copied = Self::copy_with_progress(local, dest_path, &local_label, progress)?;
        debug!(local = %local.display(), dest, bytes = copied, "uploaded");
        Ok(())
    }

    fn list(&self, prefix: &str, pattern: Option<&str>) -> Result<Vec<String>> {
        let base = Path::new(prefix);
        if !base.is_dir() {
            return Err(CatalogError::StorageNotFound {
                source_uri: prefix.to_string(),
            });
        }

        let matcher = match pattern {
            Some(p) => Some(glob_to_regex(p)?),
            None => None,
        };

        let mut matches = Vec::new();
        for entry in WalkDir::new(base).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(base) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if matcher.as_ref().is_none_or(|re| re.is_match(&relative)) {
                matches.push(entry.path().to_string_lossy().into_owned());
            }
        }
        matches.sort();
        Ok(matches)
    }

    fn list_versions(&self, _source: &str, _limit: Option<usize>) -> Result<Vec<ObjectVersion>> {
        Err(CatalogError::VersioningNotSupported {
            backend: "filesystem".to_string(),
        })
    }

    fn head_version(&self, _source: &str, _version_id: &str) -> Result<FileMetadata> {
        Err(CatalogError::VersioningNotSupported {
            backend: "filesystem".to_string(),
        })
    }

    fn download_version(
        &self,
        _source: &str,
        _dest: &Path,
        _version_id: &str,
        _progress: &ProgressFn,
    ) -> Result<()> {
        Err(CatalogError::VersioningNotSupported {
            backend: "filesystem".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_head_reports_digest_etag_and_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        fs::write(&path, "hello").unwrap();

        let storage = FilesystemStorage::new();
        let meta = storage.head(&path.to_string_lossy()).unwrap();

        assert_eq!(meta.size, Some(5));
        assert!(meta.last_modified.is_some());
        let etag = meta.etag.unwrap();
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(etag.len(), 66); // 64 hex chars plus quotes
    }

    #[test]
    fn test_head_etag_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        let storage = FilesystemStorage::new();

        fs::write(&path, "v1").unwrap();
        let first = storage.head(&path.to_string_lossy()).unwrap();
        fs::write(&path, "v2").unwrap();
        let second = storage.head(&path.to_string_lossy()).unwrap();

        assert_ne!(first.etag, second.etag);
    }

    #[test]
    fn test_head_missing_file_is_storage_not_found() {
        let storage = FilesystemStorage::new();
        let err = storage.head("/nonexistent/path/data.csv").unwrap_err();
        assert!(matches!(err, CatalogError::StorageNotFound { .. }));
    }

    #[test]
    fn test_download_reports_progress() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.bin");
        let dest = tmp.path().join("out/dest.bin");
        fs::write(&src, vec![7u8; 1000]).unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = Arc::clone(&seen);
        let storage = FilesystemStorage::new();
        storage
            .download(&src.to_string_lossy(), &dest, &move |done, total| {
                assert_eq!(total, 1000);
                seen_cb.store(done, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1000);
        assert_eq!(fs::read(dest).unwrap().len(), 1000);
    }

    #[test]
    fn test_upload_missing_local_file() {
        let tmp = TempDir::new().unwrap();
        let storage = FilesystemStorage::new();
        let err = storage
            .upload(
                &tmp.path().join("absent.csv"),
                &tmp.path().join("dest.csv").to_string_lossy(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::FileNotFound(_)));
    }

    #[test]
    fn test_list_filters_by_pattern() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("a.csv"), "").unwrap();
        fs::write(tmp.path().join("b.csv"), "").unwrap();
        fs::write(tmp.path().join("c.txt"), "").unwrap();
        fs::write(tmp.path().join("sub/d.csv"), "").unwrap();

        let storage = FilesystemStorage::new();
        let prefix = tmp.path().to_string_lossy().into_owned();

        let matched = storage.list(&prefix, Some("*.csv")).unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|p| p.ends_with(".csv")));
        assert!(!matched.iter().any(|p| p.contains("sub")));

        let deep = storage.list(&prefix, Some("**/*.csv")).unwrap();
        assert!(deep.iter().any(|p| p.ends_with("sub/d.csv")));
    }

    #[test]
    fn test_list_missing_prefix() {
        let storage = FilesystemStorage::new();
        let err = storage.list("/nonexistent/prefix", Some("*")).unwrap_err();
        assert!(matches!(err, CatalogError::StorageNotFound { .. }));
    }

    #[test]
    fn test_version_operations_unsupported() {
        let storage = FilesystemStorage::new();
        let err = storage.list_versions("/some/file", None).unwrap_err();
        match err {
            CatalogError::VersioningNotSupported { backend } => {
                assert_eq!(backend, "filesystem");
            }
            other => panic!("expected VersioningNotSupported, got {other:?}"),
        }
    }
}
