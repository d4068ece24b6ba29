//! File-based cache with JSON metadata sidecars.

use crate::config::CacheConfig;
use crate::error::{CatalogError, Result};
use crate::models::CacheMetadata;
use crate::ports::CachePort;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Local file cache implementing [`CachePort`].
///
/// For key `K` the data file lives at `<cache_dir>/K` and its freshness
/// sidecar at `<cache_dir>/K.meta.json`. Both files are required for a hit;
/// either missing is a miss, but a sidecar that exists and fails to parse
/// is corruption and surfaces as such.
pub struct FileCache {
    cache_dir: PathBuf,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Bytes across data files and sidecars.
    pub total_size_bytes: u64,
    /// Number of files, sidecars included.
    pub file_count: usize,
}

impl FileCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}{}", CacheConfig::META_SUFFIX))
    }

    /// Sidecar writes are temp-file-then-rename so a reader never observes
    /// a partially written sidecar.
    fn write_sidecar(&self, meta_path: &Path, metadata: &CacheMetadata) -> Result<()> {
        let parent = meta_path
            .parent()
            .unwrap_or(&self.cache_dir)
            .to_path_buf();
        let serialized = serde_json::to_string(metadata)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| CatalogError::io_with_path(e, &parent))?;
        tmp.write_all(serialized.as_bytes())
            .map_err(|e| CatalogError::io_with_path(e, tmp.path()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CatalogError::io_with_path(e, tmp.path()))?;
        tmp.persist(meta_path)
            .map_err(|e| CatalogError::io_with_path(e.error, meta_path))?;
        Ok(())
    }

    /// Remove now-empty directories from `dir` up to the cache root.
    fn cleanup_empty_dirs(&self, mut dir: PathBuf) {
        while dir != self.cache_dir && dir.is_dir() {
            match fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        return;
                    }
                    if fs::remove_dir(&dir).is_err() {
                        return;
                    }
                }
                Err(_) => return,
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => return,
            }
        }
    }

    /// Total cache size in bytes, sidecars included.
    pub fn size(&self) -> u64 {
        self.statistics().total_size_bytes
    }

    /// Aggregate size and file-count statistics.
    pub fn statistics(&self) -> CacheStats {
        let mut stats = CacheStats {
            total_size_bytes: 0,
            file_count: 0,
        };
        for entry in WalkDir::new(&self.cache_dir).into_iter().flatten() {
            if entry.file_type().is_file() {
                if let Ok(meta) = entry.metadata() {
                    stats.total_size_bytes += meta.len();
                    stats.file_count += 1;
                }
            }
        }
        stats
    }
}

impl CachePort for FileCache {
    fn get(&self, key: &str) -> Result<Option<(PathBuf, CacheMetadata)>> {
        let file_path = self.file_path(key);
        let meta_path = self.meta_path(key);

        if !file_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&meta_path)
            .map_err(|e| CatalogError::io_with_path(e, &meta_path))?;
        let metadata: CacheMetadata =
            serde_json::from_str(&raw).map_err(|_| CatalogError::CacheCorrupt {
                key: key.to_string(),
                path: meta_path.clone(),
            })?;

        Ok(Some((file_path, metadata)))
    }

    fn put(&self, key: &str, src: &Path, metadata: &CacheMetadata) -> Result<()> {
        let file_path = self.file_path(key);
        let meta_path = self.meta_path(key);

        // Nested keys like "logs/2024/jan.parquet" need their directories.
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io_with_path(e, parent))?;
        }

        if src != file_path {
            fs::copy(src, &file_path).map_err(|e| CatalogError::io_with_path(e, src))?;
        }
        self.write_sidecar(&meta_path, metadata)?;

        debug!(key, path = %file_path.display(), "cached");
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        for path in [self.file_path(key), self.meta_path(key)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CatalogError::io_with_path(e, path)),
            }
        }
        if let Some(parent) = self.file_path(key).parent() {
            self.cleanup_empty_dirs(parent.to_path_buf());
        }
        Ok(())
    }

    fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.list_all_keys()? {
            if key.starts_with(prefix) {
                self.invalidate(&key)?;
                removed += 1;
            }
        }

        let prefix_dir = self.cache_dir.join(prefix.trim_end_matches('/'));
        if prefix_dir.is_dir() {
            self.cleanup_empty_dirs(prefix_dir);
        }
        Ok(removed)
    }

    fn list_all_keys(&self) -> Result<Vec<String>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.cache_dir) {
            let entry = entry.map_err(|e| CatalogError::Io {
                message: e.to_string(),
                path: Some(self.cache_dir.clone()),
                source: e.into_io_error(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.cache_dir) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(key) = relative.strip_suffix(CacheConfig::META_SUFFIX) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn meta(source: &str) -> CacheMetadata {
        CacheMetadata {
            etag: Some("\"abc\"".into()),
            last_modified: Some("2024-06-01T12:00:00Z".parse().unwrap()),
            cached_at: Utc::now(),
            source: source.into(),
        }
    }

    fn write_src(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_put_get_round_trip() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "data.csv", "id,name\n1,Alice\n");

        let metadata = meta("s3://bucket/data.csv");
        cache.put("customers", &src, &metadata).unwrap();

        let (path, got) = cache.get("customers").unwrap().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "id,name\n1,Alice\n");
        assert_eq!(got, metadata);
    }

    #[test]
    fn test_miss_when_either_file_missing() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "a", "x");

        assert!(cache.get("absent").unwrap().is_none());

        cache.put("k", &src, &meta("src")).unwrap();
        fs::remove_file(tmp.path().join("k.meta.json")).unwrap();
        assert!(cache.get("k").unwrap().is_none());

        cache.put("k2", &src, &meta("src")).unwrap();
        fs::remove_file(tmp.path().join("k2")).unwrap();
        assert!(cache.get("k2").unwrap().is_none());
    }

    #[test]
    fn test_unparsable_sidecar_is_corruption_not_miss() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "a", "x");

        cache.put("k", &src, &meta("src")).unwrap();
        fs::write(tmp.path().join("k.meta.json"), "{not json").unwrap();

        let err = cache.get("k").unwrap_err();
        match err {
            CatalogError::CacheCorrupt { key, path } => {
                assert_eq!(key, "k");
                assert!(path.ends_with("k.meta.json"));
            }
            other => panic!("expected CacheCorrupt, got {other:?}"),
        }
    }

    #[test]
    fn test_put_replaces_sidecar_atomically() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "a", "x");

        let first = meta("first");
        let second = meta("second");
        cache.put("k", &src, &first).unwrap();
        cache.put("k", &src, &second).unwrap();

        let (_, got) = cache.get("k").unwrap().unwrap();
        assert_eq!(got.source, "second");
        // No stray temp files left behind.
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != "k" && n != "k.meta.json")
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn test_nested_keys_and_prefix_invalidation() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "a", "x");

        cache.put("logs/2024/jan.csv", &src, &meta("s1")).unwrap();
        cache.put("logs/2024/feb.csv", &src, &meta("s2")).unwrap();
        cache.put("other", &src, &meta("s3")).unwrap();

        assert_eq!(
            cache.list_all_keys().unwrap(),
            vec!["logs/2024/feb.csv", "logs/2024/jan.csv", "other"]
        );

        let removed = cache.invalidate_prefix("logs/").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.list_all_keys().unwrap(), vec!["other"]);
        // Emptied directories are pruned.
        assert!(!tmp.path().join("logs").exists());
    }

    #[test]
    fn test_invalidate_absent_key_is_ok() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        cache.invalidate("never-cached").unwrap();
    }

    #[test]
    fn test_statistics_counts_data_and_sidecars() {
        let tmp = TempDir::new().unwrap();
        let src_dir = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        let src = write_src(&src_dir, "a", "hello");

        cache.put("k", &src, &meta("s")).unwrap();
        let stats = cache.statistics();
        assert_eq!(stats.file_count, 2);
        assert!(stats.total_size_bytes > 5);
    }
}
