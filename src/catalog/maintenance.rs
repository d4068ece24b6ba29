//! Cache maintenance: orphan cleanup and per-dataset size accounting.

use crate::error::{CatalogError, Result};
use crate::glob::is_glob_pattern;
use crate::models::Dataset;
use crate::ports::CachePort;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Shape of date-based versioned cache keys: `YYYY-MM-DDTHHMMSS.<ext>`.
fn versioned_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{6}\.[^.]+$").expect("static regex is valid")
    })
}

/// Remove every cache key attributable to no registered dataset.
///
/// A key survives when it equals a single-file dataset name, starts with a
/// glob dataset's `<name>/` prefix, or has the versioned-key shape (a
/// deliberately retained historical pull, kept regardless of current
/// dataset references). Absence is never orphaning: only an unexplainable
/// present key is removed. Returns the removed count.
pub(super) fn clean_orphaned_keys(
    cache: &dyn CachePort,
    datasets: &HashMap<String, Dataset>,
) -> Result<usize> {
    let all_keys = cache.list_all_keys()?;
    if all_keys.is_empty() {
        return Ok(0);
    }

    let mut single_names: Vec<&str> = Vec::new();
    let mut glob_prefixes: Vec<String> = Vec::new();
    for dataset in datasets.values() {
        if is_glob_pattern(&dataset.source) {
            glob_prefixes.push(format!("{}/", dataset.name));
        } else {
            single_names.push(&dataset.name);
        }
    }

    let mut removed = 0;
    for key in &all_keys {
        if single_names.contains(&key.as_str()) {
            continue;
        }
        if glob_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            continue;
        }
        if versioned_key_pattern().is_match(key) {
            continue;
        }

        debug!(key = %key, "removing orphaned cache entry");
        cache.invalidate(key)?;
        removed += 1;
    }

    if removed > 0 {
        info!(removed, "orphan sweep complete");
    }
    Ok(removed)
}

/// Total cached bytes for one dataset: the single key's file size, or the
/// sum over a glob dataset's prefix. Uncached datasets count as zero.
pub(super) fn calculate_cache_size(
    name: &str,
    datasets: &HashMap<String, Dataset>,
    cache: &dyn CachePort,
) -> Result<u64> {
    let dataset = datasets.get(name).ok_or_else(|| CatalogError::DatasetNotFound {
        name: name.to_string(),
        available: datasets.keys().cloned().collect(),
    })?;

    if is_glob_pattern(&dataset.source) {
        let prefix = format!("{name}/");
        let mut total = 0u64;
        for key in cache.list_all_keys()? {
            if !key.starts_with(&prefix) {
                continue;
            }
            if let Some((path, _)) = cache.get(&key)? {
                if let Ok(meta) = std::fs::metadata(&path) {
                    total += meta.len();
                }
            }
        }
        return Ok(total);
    }

    match cache.get(name)? {
        Some((path, _)) => Ok(std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0)),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_key_pattern() {
        let re = versioned_key_pattern();
        assert!(re.is_match("2024-06-01T123045.parquet"));
        assert!(re.is_match("1999-01-31T000000.csv"));
        assert!(!re.is_match("2024-06-01T12:30:45.parquet"));
        assert!(!re.is_match("2024-06-01T123045"));
        assert!(!re.is_match("2024-06-01T123045.tar.gz"));
        assert!(!re.is_match("customers"));
        assert!(!re.is_match("logs/2024-06-01T123045.parquet"));
    }
}
