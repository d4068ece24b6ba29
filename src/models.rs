//! Core domain types: datasets, freshness fingerprints, object versions.
//!
//! These types are pure data with no I/O. Construction validates the
//! invariants the rest of the engine relies on (non-empty dataset names,
//! at least one freshness field on [`FileMetadata`]).

use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A named dataset pointing at a remote storage location.
///
/// Immutable once constructed; the `with_*` methods return derived copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Unique identifier within a catalog.
    pub name: String,
    /// Remote storage URI or path. May contain glob metacharacters.
    pub source: String,
    /// Human-readable description.
    pub description: String,
    /// Explicit local cache destination. When absent the catalog derives
    /// one from the source's trailing segment under its cache root.
    pub cache_path: Option<PathBuf>,
}

impl Dataset {
    /// Create a dataset. Empty names and sources are rejected.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let source = source.into();
        if name.is_empty() {
            return Err(CatalogError::validation("Dataset name cannot be empty"));
        }
        if source.is_empty() {
            return Err(CatalogError::validation("Dataset source cannot be empty"));
        }
        Ok(Self {
            name,
            source,
            description: String::new(),
            cache_path: None,
        })
    }

    /// Derived copy with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Derived copy with an explicit cache path.
    pub fn with_cache_path(mut self, cache_path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(cache_path.into());
        self
    }

    /// Derived copy with relative local paths resolved against `root`: a
    /// relative filesystem `source` (URIs are left alone) and a relative
    /// `cache_path`. Absolute and unset paths are returned unchanged.
    pub fn with_resolved_paths(mut self, root: &Path) -> Self {
        if !self.source.contains("://") && Path::new(&self.source).is_relative() {
            self.source = root.join(&self.source).to_string_lossy().into_owned();
        }
        if let Some(p) = &self.cache_path {
            if p.is_relative() {
                self.cache_path = Some(root.join(p));
            }
        }
        self
    }
}

/// Freshness fingerprint of a remote file, as returned by a storage `head`.
///
/// At least one of `etag` / `last_modified` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Opaque content-version token (e.g. an S3 object ETag).
    pub etag: Option<String>,
    /// Remote last-modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
    /// Size in bytes, when the backend reports it.
    pub size: Option<u64>,
}

impl FileMetadata {
    /// Create a fingerprint. Fails unless at least one freshness field is set.
    pub fn new(
        etag: Option<String>,
        last_modified: Option<DateTime<Utc>>,
        size: Option<u64>,
    ) -> Result<Self> {
        if etag.is_none() && last_modified.is_none() {
            return Err(CatalogError::validation(
                "FileMetadata must have at least etag or last_modified",
            ));
        }
        Ok(Self {
            etag,
            last_modified,
            size,
        })
    }

    /// Whether two fingerprints identify the same file version.
    ///
    /// ETag equality is authoritative when both sides carry one (immune to
    /// clock skew). Otherwise falls back to exact `last_modified` equality.
    /// Returns false when no field is comparable.
    pub fn matches(&self, other: &FileMetadata) -> bool {
        if let (Some(a), Some(b)) = (&self.etag, &other.etag) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.last_modified, &other.last_modified) {
            return a == b;
        }
        false
    }
}

/// Freshness signal frozen at cache-write time, persisted as the
/// `.meta.json` sidecar next to each cached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// When the file was cached locally.
    pub cached_at: DateTime<Utc>,
    /// Original source URI, for verification.
    pub source: String,
}

impl CacheMetadata {
    /// Record the given remote fingerprint as of now.
    pub fn from_remote(remote: &FileMetadata, source: impl Into<String>) -> Self {
        Self {
            etag: remote.etag.clone(),
            last_modified: remote.last_modified,
            cached_at: Utc::now(),
            source: source.into(),
        }
    }

    /// Convert to a [`FileMetadata`] for staleness comparison. Fails when
    /// neither freshness field survived (a sidecar written by a buggy
    /// backend).
    pub fn to_file_metadata(&self) -> Result<FileMetadata> {
        FileMetadata::new(self.etag.clone(), self.last_modified, None)
    }

    /// Whether the cached copy is stale versus the current remote
    /// fingerprint. Incomparable fingerprints are conservatively stale.
    pub fn is_stale(&self, remote: &FileMetadata) -> bool {
        match self.to_file_metadata() {
            Ok(cached) => !cached.matches(remote),
            Err(_) => true,
        }
    }
}

/// One historical version of a remote object, as listed by a versioned
/// storage backend. Listings are newest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    /// Backend-assigned version id (absent on non-versioned buckets).
    pub version_id: Option<String>,
    /// When this version was created. The ordering key.
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
    pub size: Option<u64>,
    /// Whether this is the current version.
    pub is_latest: bool,
    /// Delete markers represent deleted objects and cannot be downloaded.
    pub is_delete_marker: bool,
}

impl ObjectVersion {
    pub fn to_file_metadata(&self) -> Result<FileMetadata> {
        FileMetadata::new(self.etag.clone(), Some(self.last_modified), self.size)
    }
}

impl PartialOrd for ObjectVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.last_modified.cmp(&other.last_modified)
    }
}

/// Find the version that was current at `as_of`.
///
/// `versions` is assumed newest-first. Delete markers are skipped. Returns
/// `None` when every version postdates `as_of` — the caller must surface
/// that as a distinct failure, never fall back to latest or earliest.
pub fn find_version_at(
    versions: &[ObjectVersion],
    as_of: DateTime<Utc>,
) -> Option<&ObjectVersion> {
    versions
        .iter()
        .filter(|v| !v.is_delete_marker)
        .find(|v| v.last_modified <= as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn version(last_modified: &str, id: &str, delete_marker: bool) -> ObjectVersion {
        ObjectVersion {
            version_id: Some(id.to_string()),
            last_modified: ts(last_modified),
            etag: None,
            size: None,
            is_latest: false,
            is_delete_marker: delete_marker,
        }
    }

    #[test]
    fn test_dataset_rejects_empty_name() {
        assert!(Dataset::new("", "s3://bucket/key").is_err());
        assert!(Dataset::new("data", "").is_err());
    }

    #[test]
    fn test_dataset_with_methods_do_not_mutate_original() {
        let ds = Dataset::new("customers", "s3://bucket/customers.parquet").unwrap();
        let derived = ds.clone().with_cache_path("data/customers.parquet");
        assert!(ds.cache_path.is_none());
        assert_eq!(
            derived.cache_path.unwrap(),
            PathBuf::from("data/customers.parquet")
        );
    }

    #[test]
    fn test_with_resolved_paths_joins_relative_only() {
        let root = Path::new("/project");
        let relative = Dataset::new("a", "src")
            .unwrap()
            .with_cache_path("data/a.csv")
            .with_resolved_paths(root);
        assert_eq!(relative.cache_path.unwrap(), PathBuf::from("/project/data/a.csv"));

        let absolute = Dataset::new("b", "src")
            .unwrap()
            .with_cache_path("/elsewhere/b.csv")
            .with_resolved_paths(root);
        assert_eq!(absolute.cache_path.unwrap(), PathBuf::from("/elsewhere/b.csv"));

        let unset = Dataset::new("c", "src").unwrap().with_resolved_paths(root);
        assert!(unset.cache_path.is_none());
    }

    #[test]
    fn test_with_resolved_paths_rewrites_relative_source_only() {
        let root = Path::new("/project");

        let relative = Dataset::new("a", "exports/a.csv")
            .unwrap()
            .with_resolved_paths(root);
        assert_eq!(relative.source, "/project/exports/a.csv");

        let uri = Dataset::new("b", "s3://bucket/b.csv")
            .unwrap()
            .with_resolved_paths(root);
        assert_eq!(uri.source, "s3://bucket/b.csv");

        let absolute = Dataset::new("c", "/srv/c.csv")
            .unwrap()
            .with_resolved_paths(root);
        assert_eq!(absolute.source, "/srv/c.csv");
    }

    #[test]
    fn test_file_metadata_requires_a_freshness_field() {
        assert!(FileMetadata::new(None, None, Some(10)).is_err());
        assert!(FileMetadata::new(Some("\"abc\"".into()), None, None).is_ok());
        assert!(FileMetadata::new(None, Some(Utc::now()), None).is_ok());
    }

    #[test]
    fn test_etag_match_overrides_differing_timestamps() {
        let a = FileMetadata::new(Some("\"x\"".into()), Some(ts("2024-01-01T00:00:00Z")), None)
            .unwrap();
        let b = FileMetadata::new(Some("\"x\"".into()), Some(ts("2024-06-01T00:00:00Z")), None)
            .unwrap();
        assert!(a.matches(&b));
    }

    #[test]
    fn test_etag_mismatch_overrides_equal_timestamps() {
        let t = ts("2024-01-01T00:00:00Z");
        let a = FileMetadata::new(Some("\"x\"".into()), Some(t), None).unwrap();
        let b = FileMetadata::new(Some("\"y\"".into()), Some(t), None).unwrap();
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_timestamp_fallback_when_one_etag_missing() {
        let t = ts("2024-01-01T00:00:00Z");
        let a = FileMetadata::new(Some("\"x\"".into()), Some(t), None).unwrap();
        let b = FileMetadata::new(None, Some(t), None).unwrap();
        assert!(a.matches(&b));
    }

    #[test]
    fn test_no_comparable_signal_is_stale() {
        // Cached side has only last_modified, remote has only etag.
        let cached = CacheMetadata {
            etag: None,
            last_modified: Some(ts("2024-01-01T00:00:00Z")),
            cached_at: Utc::now(),
            source: "s".into(),
        };
        let remote = FileMetadata::new(Some("\"x\"".into()), None, None).unwrap();
        assert!(cached.is_stale(&remote));
    }

    #[test]
    fn test_cache_metadata_round_trips_through_json() {
        let meta = CacheMetadata {
            etag: Some("\"abc\"".into()),
            last_modified: Some(ts("2024-06-01T12:00:00Z")),
            cached_at: Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 0).unwrap(),
            source: "s3://bucket/file.parquet".into(),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: CacheMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn test_find_version_at_picks_newest_not_after() {
        let versions = vec![
            version("2024-03-01T00:00:00Z", "v3", false),
            version("2024-02-01T00:00:00Z", "v2", false),
            version("2024-01-01T00:00:00Z", "v1", false),
        ];
        let found = find_version_at(&versions, ts("2024-02-15T00:00:00Z")).unwrap();
        assert_eq!(found.version_id.as_deref(), Some("v2"));
    }

    #[test]
    fn test_find_version_at_boundary_is_inclusive() {
        let versions = vec![version("2024-02-01T00:00:00Z", "v2", false)];
        let found = find_version_at(&versions, ts("2024-02-01T00:00:00Z")).unwrap();
        assert_eq!(found.version_id.as_deref(), Some("v2"));
    }

    #[test]
    fn test_find_version_at_skips_delete_markers() {
        let versions = vec![
            version("2024-03-01T00:00:00Z", "marker", true),
            version("2024-01-01T00:00:00Z", "v1", false),
        ];
        let found = find_version_at(&versions, ts("2024-03-02T00:00:00Z")).unwrap();
        assert_eq!(found.version_id.as_deref(), Some("v1"));
    }

    #[test]
    fn test_find_version_at_before_all_versions_is_none() {
        let versions = vec![version("2024-01-01T00:00:00Z", "v1", false)];
        assert!(find_version_at(&versions, ts("2023-12-31T23:59:59Z")).is_none());
    }
}
