//! Fetch state machines the [`Catalog`](super::Catalog) delegates to.
//!
//! These are free functions over the ports so that batch-fetch tasks can
//! run them without borrowing the catalog itself. Each invocation touches
//! exactly one cache key.

use crate::error::{CatalogError, Result};
use crate::glob::{derive_cache_key, is_glob_pattern, split_glob_pattern};
use crate::models::{CacheMetadata, Dataset};
use crate::paths::{resolve_cache_path, resolve_version_cache_key};
use crate::ports::{CachePort, ProgressReporter, StoragePort};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::FetchResult;

/// Fetch one dataset, dispatching on its shape. Version addressing is
/// handled by the catalog before this point.
pub(super) fn fetch_dispatch(
    dataset: &Dataset,
    progress: &dyn ProgressReporter,
    storage: &dyn StoragePort,
    cache: &dyn CachePort,
    cache_dir: Option<&Path>,
    dry_run: bool,
) -> Result<FetchResult> {
    if is_glob_pattern(&dataset.source) {
        fetch_glob(dataset, progress, storage, cache, cache_dir, dry_run).map(FetchResult::Glob)
    } else {
        fetch_single(
            &dataset.name,
            dataset,
            progress,
            storage,
            cache,
            cache_dir,
            dry_run,
        )
        .map(FetchResult::Single)
    }
}

/// Single-file fetch with caching and staleness detection.
///
/// Lookup -> verify -> fresh returns the cached path untouched; stale or
/// absent downloads (skipped under dry run) and records fresh metadata.
pub(super) fn fetch_single(
    cache_key: &str,
    dataset: &Dataset,
    progress: &dyn ProgressReporter,
    storage: &dyn StoragePort,
    cache: &dyn CachePort,
    cache_dir: Option<&Path>,
    dry_run: bool,
) -> Result<PathBuf> {
    let cached = cache.get(cache_key)?;

    if let Some((cached_path, cache_meta)) = &cached {
        let remote_meta = storage.head(&dataset.source)?;
        if !cache_meta.is_stale(&remote_meta) {
            debug!(key = cache_key, "cache hit, fresh");
            return Ok(cached_path.clone());
        }
        debug!(key = cache_key, "cache hit, stale");
    } else {
        debug!(key = cache_key, "cache miss");
    }

    // Dry run: probe the remote so a missing source still fails, but never
    // transfer or touch the cache.
    if dry_run {
        storage.head(&dataset.source)?;
        if let Some((cached_path, _)) = cached {
            return Ok(cached_path);
        }
        return resolve_cache_path(dataset, cache_dir);
    }

    let dest = resolve_cache_path(dataset, cache_dir)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CatalogError::io_with_path(e, parent))?;
    }

    let remote_meta = storage.head(&dataset.source)?;
    let total_bytes = remote_meta.size.unwrap_or(0);

    info!(key = cache_key, source = %dataset.source, "downloading");
    let callback = progress.start_task(cache_key, total_bytes);
    let download_result = storage.download(&dataset.source, &dest, &*callback);
    // Finish is always attempted, even when the transfer failed.
    progress.finish_task(cache_key);
    download_result?;

    let cache_meta = CacheMetadata::from_remote(&remote_meta, &dataset.source);
    cache.put(cache_key, &dest, &cache_meta)?;

    // Return the path the cache reports; it may differ from the chosen
    // destination depending on cache internals.
    match cache.get(cache_key)? {
        Some((path, _)) => Ok(path),
        None => Ok(dest),
    }
}

/// Fetch one specific version of a dataset into the date-keyed cache space.
///
/// Versioned entries are immutable, so a cache hit never re-probes the
/// remote; the latest-fetch staleness check never consults these keys.
pub(super) fn fetch_version(
    dataset: &Dataset,
    version_id: &str,
    progress: &dyn ProgressReporter,
    storage: &dyn StoragePort,
    cache: &dyn CachePort,
    cache_dir: Option<&Path>,
    dry_run: bool,
) -> Result<PathBuf> {
    let remote_meta = storage.head_version(&dataset.source, version_id)?;
    let last_modified = remote_meta.last_modified.ok_or_else(|| {
        CatalogError::validation(format!(
            "Version {version_id} of '{}' has no last_modified timestamp",
            dataset.name
        ))
    })?;

    let cache_key = resolve_version_cache_key(&dataset.source, last_modified);

    if let Some((path, _)) = cache.get(&cache_key)? {
        debug!(key = %cache_key, "versioned cache hit");
        return Ok(path);
    }

    let cache_dir = cache_dir.ok_or_else(|| CatalogError::Configuration {
        message: "cache_dir is required for versioned fetches".to_string(),
    })?;

    if dry_run {
        return Ok(cache_dir.join(&cache_key));
    }

    std::fs::create_dir_all(cache_dir).map_err(|e| CatalogError::io_with_path(e, cache_dir))?;

    // Download to a temp file in the cache root, then register through the
    // cache so the key appears atomically. The temp file is removed on drop.
    let tmp = tempfile::NamedTempFile::new_in(cache_dir)
        .map_err(|e| CatalogError::io_with_path(e, cache_dir))?;

    let total_bytes = remote_meta.size.unwrap_or(0);
    info!(key = %cache_key, version_id, source = %dataset.source, "downloading version");
    let callback = progress.start_task(&cache_key, total_bytes);
    let download_result = storage.download_version(&dataset.source, tmp.path(), version_id, &*callback);
    progress.finish_task(&cache_key);
    download_result?;

    let cache_meta = CacheMetadata::from_remote(&remote_meta, &dataset.source);
    cache.put(&cache_key, tmp.path(), &cache_meta)?;

    match cache.get(&cache_key)? {
        Some((path, _)) => Ok(path),
        None => Ok(cache_dir.join(&cache_key)),
    }
}

/// Fetch every file matching a glob dataset. Each match runs the
/// single-file state machine independently under its own hierarchical key,
/// so staleness is tracked per file. Result order follows the storage
/// listing's sorted order.
pub(super) fn fetch_glob(
    dataset: &Dataset,
    progress: &dyn ProgressReporter,
    storage: &dyn StoragePort,
    cache: &dyn CachePort,
    cache_dir: Option<&Path>,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    let (prefix, pattern) = split_glob_pattern(&dataset.source)?;
    let matched = storage.list(&prefix, Some(&pattern))?;

    if matched.is_empty() {
        return Err(CatalogError::EmptyGlobMatch { pattern, prefix });
    }

    debug!(
        dataset = %dataset.name,
        matches = matched.len(),
        "expanding glob dataset"
    );

    let mut paths = Vec::with_capacity(matched.len());
    for uri in &matched {
        let cache_key = derive_cache_key(&dataset.name, &prefix, uri);
        let member = Dataset::new(cache_key.clone(), uri.clone())?
            .with_description(dataset.description.clone());
        let path = fetch_single(
            &cache_key, &member, progress, storage, cache, cache_dir, dry_run,
        )?;
        paths.push(path);
    }

    Ok(paths)
}
