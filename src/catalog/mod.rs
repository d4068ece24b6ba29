//! The catalog orchestrator.
//!
//! [`Catalog`] owns an immutable dataset registry and composes the injected
//! storage, cache, executor, and progress ports into the fetch/push/
//! maintenance operations. It keeps no hidden state beyond the cache: every
//! decision is driven by externally observable storage state.

mod fetch;
mod maintenance;

use crate::adapters::{FileCache, RouterStorage};
use crate::config::{self, CacheConfig};
use crate::error::{CatalogError, Result};
use crate::glob::is_glob_pattern;
use crate::models::{find_version_at, Dataset, ObjectVersion};
use crate::ports::{
    CachePort, ExecutorPort, FetchTask, NullProgressReporter, ProgressReporter, StoragePort,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a fetch: one path for single-file and versioned datasets, a
/// listing-ordered set of paths for glob datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Single(PathBuf),
    Glob(Vec<PathBuf>),
}

impl FetchResult {
    /// The single path, or `None` for glob results.
    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchResult::Single(p) => Some(p),
            FetchResult::Glob(_) => None,
        }
    }

    /// All paths, in order.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            FetchResult::Single(p) => vec![p.as_path()],
            FetchResult::Glob(ps) => ps.iter().map(PathBuf::as_path).collect(),
        }
    }
}

/// Options for a single fetch. Exactly one addressing mode applies: latest
/// (the default), an explicit version id, or an as-of instant.
#[derive(Default, Clone)]
pub struct FetchOptions {
    /// Fetch this specific backend version.
    pub version_id: Option<String>,
    /// Fetch the version that was current at this instant.
    pub as_of: Option<DateTime<Utc>>,
    /// Report intent without downloading or mutating the cache.
    pub dry_run: bool,
    /// Progress reporter; `None` means no output.
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

/// Options for [`Catalog::fetch_all`].
#[derive(Default, Clone)]
pub struct FetchAllOptions {
    /// `None` or `Some(1)` fetches strictly sequentially on the caller's
    /// thread with no pool created; larger values submit each dataset to
    /// the configured executor.
    pub max_workers: Option<usize>,
    pub dry_run: bool,
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

/// Orchestrates dataset fetching with caching and staleness detection.
pub struct Catalog {
    datasets: HashMap<String, Dataset>,
    storage: Arc<dyn StoragePort>,
    cache: Arc<dyn CachePort>,
    cache_dir: Option<PathBuf>,
    executor: Option<Arc<dyn ExecutorPort>>,
}

impl Catalog {
    /// Create a catalog over injected storage and cache backends.
    pub fn new(
        datasets: Vec<Dataset>,
        storage: Arc<dyn StoragePort>,
        cache: Arc<dyn CachePort>,
    ) -> Self {
        let datasets = datasets.into_iter().map(|d| (d.name.clone(), d)).collect();
        Self {
            datasets,
            storage,
            cache,
            cache_dir: None,
            executor: None,
        }
    }

    /// Set the cache root used for derived destinations and versioned keys.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Set the executor used by parallel [`Catalog::fetch_all`].
    pub fn with_executor(mut self, executor: Arc<dyn ExecutorPort>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Create a catalog with default adapters and an auto-discovered
    /// project root: [`RouterStorage`] over the filesystem, a [`FileCache`]
    /// under `<root>/<cache_dir>`, and dataset paths resolved against the
    /// root.
    pub fn from_directory(
        datasets: Vec<Dataset>,
        start_dir: Option<&Path>,
        cache_dir: Option<&Path>,
    ) -> Result<Self> {
        let cwd;
        let start = match start_dir {
            Some(dir) => dir,
            None => {
                cwd = std::env::current_dir()?;
                &cwd
            }
        };
        let root = config::find_project_root(start);

        let cache_dir = cache_dir.unwrap_or_else(|| Path::new(CacheConfig::DEFAULT_CACHE_DIR_NAME));
        let resolved_cache_dir = if cache_dir.is_absolute() {
            cache_dir.to_path_buf()
        } else {
            root.join(cache_dir)
        };

        let resolved_datasets = datasets
            .into_iter()
            .map(|d| d.with_resolved_paths(&root))
            .collect();

        info!(root = %root.display(), cache_dir = %resolved_cache_dir.display(), "catalog configured");
        Ok(Self::new(
            resolved_datasets,
            Arc::new(RouterStorage::with_filesystem_defaults()),
            Arc::new(FileCache::new(&resolved_cache_dir)),
        )
        .with_cache_dir(resolved_cache_dir))
    }

    /// All registered datasets.
    pub fn datasets(&self) -> Vec<&Dataset> {
        self.datasets.values().collect()
    }

    /// Look up a dataset by name.
    pub fn get_dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasets.get(name).ok_or_else(|| CatalogError::DatasetNotFound {
            name: name.to_string(),
            available: self.datasets.keys().cloned().collect(),
        })
    }

    /// Fetch a dataset's latest version with default options.
    pub fn fetch(&self, name: &str) -> Result<FetchResult> {
        self.fetch_with(name, &FetchOptions::default())
    }

    /// Fetch a dataset, downloading when not cached or stale.
    ///
    /// Glob datasets return every matched file; version addressing
    /// (`version_id` / `as_of`) is mutually exclusive and unsupported for
    /// glob datasets. Under `dry_run` no transfer happens and the cache is
    /// never written, any number of repeated calls included.
    pub fn fetch_with(&self, name: &str, options: &FetchOptions) -> Result<FetchResult> {
        if options.version_id.is_some() && options.as_of.is_some() {
            return Err(CatalogError::validation(
                "version_id and as_of are mutually exclusive",
            ));
        }

        let dataset = self.get_dataset(name)?;
        let progress = options
            .progress
            .clone()
            .unwrap_or_else(|| Arc::new(NullProgressReporter));

        if is_glob_pattern(&dataset.source) {
            if options.version_id.is_some() || options.as_of.is_some() {
                return Err(CatalogError::validation(
                    "Versioned fetch (version_id or as_of) is not supported for glob pattern datasets",
                ));
            }
            return fetch::fetch_glob(
                dataset,
                &*progress,
                &*self.storage,
                &*self.cache,
                self.cache_dir.as_deref(),
                options.dry_run,
            )
            .map(FetchResult::Glob);
        }

        // Resolve as_of to a concrete version id.
        let version_id = match (&options.version_id, options.as_of) {
            (Some(id), _) => Some(id.clone()),
            (None, Some(as_of)) => {
                let versions = self.storage.list_versions(&dataset.source, None)?;
                let resolved = find_version_at(&versions, as_of).ok_or(
                    CatalogError::VersionNotFound {
                        name: name.to_string(),
                        as_of,
                    },
                )?;
                debug!(name, %as_of, version = ?resolved.version_id, "resolved as_of");
                Some(resolved.version_id.clone().ok_or_else(|| CatalogError::Storage {
                    message: format!("version at {as_of} has no version id"),
                    source_uri: dataset.source.clone(),
                })?)
            }
            (None, None) => None,
        };

        if let Some(version_id) = version_id {
            return fetch::fetch_version(
                dataset,
                &version_id,
                &*progress,
                &*self.storage,
                &*self.cache,
                self.cache_dir.as_deref(),
                options.dry_run,
            )
            .map(FetchResult::Single);
        }

        fetch::fetch_single(
            name,
            dataset,
            &*progress,
            &*self.storage,
            &*self.cache,
            self.cache_dir.as_deref(),
            options.dry_run,
        )
        .map(FetchResult::Single)
    }

    /// Fetch every registered dataset, downloading any that are stale.
    ///
    /// With `max_workers` unset or 1, or no executor configured, datasets
    /// are fetched one after another on the caller's thread — an explicit
    /// low-resource mode, not an optimization. Larger values submit one
    /// task per dataset to the executor; tasks share no mutable state
    /// beyond their own disjoint cache keys. The first failing dataset
    /// aborts the batch.
    pub fn fetch_all(&self, options: &FetchAllOptions) -> Result<HashMap<String, FetchResult>> {
        if self.datasets.is_empty() {
            return Ok(HashMap::new());
        }

        let progress = options
            .progress
            .clone()
            .unwrap_or_else(|| Arc::new(NullProgressReporter));

        let parallel = options.max_workers.is_some_and(|w| w > 1);
        let mut results = HashMap::with_capacity(self.datasets.len());

        let executor = match (&self.executor, parallel) {
            (Some(executor), true) => executor,
            _ => {
                for dataset in self.datasets.values() {
                    let result = fetch::fetch_dispatch(
                        dataset,
                        &*progress,
                        &*self.storage,
                        &*self.cache,
                        self.cache_dir.as_deref(),
                        options.dry_run,
                    )?;
                    results.insert(dataset.name.clone(), result);
                }
                return Ok(results);
            }
        };

        let tasks: Vec<FetchTask> = self
            .datasets
            .values()
            .map(|dataset| {
                let dataset = dataset.clone();
                let storage = Arc::clone(&self.storage);
                let cache = Arc::clone(&self.cache);
                let cache_dir = self.cache_dir.clone();
                let progress = Arc::clone(&progress);
                let dry_run = options.dry_run;
                let task: FetchTask = Box::new(move || {
                    let result = fetch::fetch_dispatch(
                        &dataset,
                        &*progress,
                        &*storage,
                        &*cache,
                        cache_dir.as_deref(),
                        dry_run,
                    );
                    (dataset.name.clone(), result)
                });
                task
            })
            .collect();

        for (name, result) in executor.run_all(tasks) {
            results.insert(name, result?);
        }
        Ok(results)
    }

    /// Whether a dataset's cached copy is stale (or absent) versus the
    /// remote, without downloading.
    pub fn is_stale(&self, name: &str) -> Result<bool> {
        let dataset = self.get_dataset(name)?;
        match self.cache.get(name)? {
            Some((_, cache_meta)) => {
                let remote_meta = self.storage.head(&dataset.source)?;
                Ok(cache_meta.is_stale(&remote_meta))
            }
            None => Ok(true),
        }
    }

    /// Remove a dataset from cache, forcing re-download on the next fetch.
    pub fn invalidate(&self, name: &str) -> Result<()> {
        self.cache.invalidate(name)
    }

    /// Remove every cached file of a glob dataset; returns the count
    /// removed. Fails on non-glob datasets.
    pub fn invalidate_glob(&self, name: &str) -> Result<usize> {
        let dataset = self.get_dataset(name)?;
        if !is_glob_pattern(&dataset.source) {
            return Err(CatalogError::validation(format!(
                "Dataset '{name}' is not a glob pattern; use invalidate() for single-file datasets"
            )));
        }
        self.cache.invalidate_prefix(&format!("{name}/"))
    }

    /// List a dataset's version history, newest-first, optionally capped.
    /// Fails with [`CatalogError::VersioningNotSupported`] on backends that
    /// cannot enumerate versions.
    pub fn versions(&self, name: &str, limit: Option<usize>) -> Result<Vec<ObjectVersion>> {
        let dataset = self.get_dataset(name)?;
        self.storage.list_versions(&dataset.source, limit)
    }

    /// Upload a local file to a dataset's remote source and refresh the
    /// cache so an immediate fetch is a hit with no re-download.
    pub fn push(
        &self,
        name: &str,
        local_path: &Path,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<()> {
        let dataset = self.get_dataset(name)?;
        if !local_path.exists() {
            return Err(CatalogError::FileNotFound(local_path.to_path_buf()));
        }

        let null = NullProgressReporter;
        let progress = progress.unwrap_or(&null);

        let total_bytes = std::fs::metadata(local_path)
            .map_err(|e| CatalogError::io_with_path(e, local_path))?
            .len();

        info!(name, dest = %dataset.source, "uploading");
        let callback = progress.start_task(name, total_bytes);
        let upload_result = self
            .storage
            .upload(local_path, &dataset.source, Some(&*callback));
        progress.finish_task(name);
        upload_result?;

        // Record the post-upload remote fingerprint so the cache matches
        // what storage now reports.
        let remote_meta = self.storage.head(&dataset.source)?;
        let cache_meta = crate::models::CacheMetadata::from_remote(&remote_meta, &dataset.source);
        self.cache.put(name, local_path, &cache_meta)
    }

    /// Total cached bytes for a dataset (0 when uncached).
    pub fn cache_size(&self, name: &str) -> Result<u64> {
        maintenance::calculate_cache_size(name, &self.datasets, &*self.cache)
    }

    /// Remove cache entries attributable to no registered dataset, glob
    /// prefix, or versioned-key shape; returns the removed count.
    pub fn clean_orphaned(&self) -> Result<usize> {
        maintenance::clean_orphaned_keys(&*self.cache, &self.datasets)
    }
}
