//! Cache destination and cache-key derivation.

use crate::error::{CatalogError, Result};
use crate::models::Dataset;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// The source's trailing segment used for derived cache destinations.
///
/// For URIs the full key path after the bucket/host is kept
/// (`s3://bucket/path/to/file.ext` -> `path/to/file.ext`) so derived
/// destinations preserve remote layout; plain local paths keep only the
/// file name.
pub(crate) fn source_trailing_segment(source: &str) -> String {
    if let Some((_, rest)) = source.split_once("://") {
        match rest.split_once('/') {
            Some((_, key)) => key.to_string(),
            None => rest.to_string(),
        }
    } else {
        Path::new(source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.to_string())
    }
}

/// Resolve the local destination for a dataset: the explicit `cache_path`
/// when set, otherwise derived from the source under `cache_dir`.
pub(crate) fn resolve_cache_path(dataset: &Dataset, cache_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(ref explicit) = dataset.cache_path {
        return Ok(explicit.clone());
    }

    let cache_dir = cache_dir.ok_or_else(|| CatalogError::Configuration {
        message: format!(
            "Dataset '{}' has no cache_path and no cache_dir configured",
            dataset.name
        ),
    })?;

    Ok(cache_dir.join(source_trailing_segment(&dataset.source)))
}

/// Date-based cache key for a versioned fetch: `YYYY-MM-DDTHHMMSS.<ext>`,
/// UTC, second precision, colon-free, extension taken from the source.
///
/// Deliberately independent of the backend's opaque version-id string:
/// re-resolving the same instant always yields the same key even if the
/// backend's id format changes.
pub(crate) fn resolve_version_cache_key(source: &str, last_modified: DateTime<Utc>) -> String {
    let filename = source_trailing_segment(source);
    let ext = Path::new(&filename)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    format!("{}{}", last_modified.format("%Y-%m-%dT%H%M%S"), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_segment_for_uri_keeps_key_path() {
        assert_eq!(
            source_trailing_segment("s3://bucket/path/to/file.parquet"),
            "path/to/file.parquet"
        );
    }

    #[test]
    fn test_trailing_segment_for_local_path_is_filename() {
        assert_eq!(source_trailing_segment("/data/raw/file.csv"), "file.csv");
    }

    #[test]
    fn test_resolve_prefers_explicit_cache_path() {
        let ds = Dataset::new("a", "s3://bucket/a.csv")
            .unwrap()
            .with_cache_path("/custom/a.csv");
        let path = resolve_cache_path(&ds, Some(Path::new("/cache"))).unwrap();
        assert_eq!(path, PathBuf::from("/custom/a.csv"));
    }

    #[test]
    fn test_resolve_derives_under_cache_dir() {
        let ds = Dataset::new("a", "s3://bucket/nested/a.csv").unwrap();
        let path = resolve_cache_path(&ds, Some(Path::new("/cache"))).unwrap();
        assert_eq!(path, PathBuf::from("/cache/nested/a.csv"));
    }

    #[test]
    fn test_resolve_without_cache_dir_is_configuration_error() {
        let ds = Dataset::new("a", "s3://bucket/a.csv").unwrap();
        assert!(resolve_cache_path(&ds, None).is_err());
    }

    #[test]
    fn test_version_key_format() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap();
        assert_eq!(
            resolve_version_cache_key("s3://bucket/data/file.parquet", t),
            "2024-06-01T123045.parquet"
        );
    }

    #[test]
    fn test_version_key_without_extension() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            resolve_version_cache_key("s3://bucket/data/LICENSE", t),
            "2024-06-01T000000"
        );
    }

    #[test]
    fn test_version_key_is_deterministic() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let a = resolve_version_cache_key("s3://bucket/f.csv", t);
        let b = resolve_version_cache_key("s3://bucket/f.csv", t);
        assert_eq!(a, b);
    }
}
