//! Port traits the catalog orchestrates over.
//!
//! The catalog holds trait objects only; concrete adapters live in
//! [`crate::adapters`] or in caller code. Each port is one method set, which
//! keeps fakes trivial to write in tests.

use crate::error::Result;
use crate::models::{CacheMetadata, FileMetadata, ObjectVersion};
use std::path::{Path, PathBuf};

/// Byte-progress callback: `(bytes_done, bytes_total)`.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

/// Owned progress callback handed out by [`ProgressReporter::start_task`].
pub type ProgressCallback = Box<ProgressFn>;

/// Remote storage backend (object store, filesystem, ...).
pub trait StoragePort: Send + Sync {
    /// Fetch the freshness fingerprint of `source` without transferring data.
    fn head(&self, source: &str) -> Result<FileMetadata>;

    /// Stream `source` to `dest`, reporting byte progress.
    fn download(&self, source: &str, dest: &Path, progress: &ProgressFn) -> Result<()>;

    /// Upload a local file to `dest` with optional progress reporting.
    fn upload(&self, local: &Path, dest: &str, progress: Option<&ProgressFn>) -> Result<()>;

    /// List full URIs under `prefix`, optionally filtered by a glob
    /// `pattern`, sorted.
    fn list(&self, prefix: &str, pattern: Option<&str>) -> Result<Vec<String>>;

    /// List versions of `source`, newest-first, optionally capped.
    fn list_versions(&self, source: &str, limit: Option<usize>) -> Result<Vec<ObjectVersion>>;

    /// Fingerprint of one specific version.
    fn head_version(&self, source: &str, version_id: &str) -> Result<FileMetadata>;

    /// Stream one specific version of `source` to `dest`.
    fn download_version(
        &self,
        source: &str,
        dest: &Path,
        version_id: &str,
        progress: &ProgressFn,
    ) -> Result<()>;
}

/// Local file cache with metadata tracking.
///
/// A cache miss is `Ok(None)`; an unparsable metadata sidecar is
/// [`crate::CatalogError::CacheCorrupt`], never a miss.
pub trait CachePort: Send + Sync {
    /// Cached file path and metadata for `key`, or `None` if not cached.
    fn get(&self, key: &str) -> Result<Option<(PathBuf, CacheMetadata)>>;

    /// Store the file at `src` under `key` with its metadata, replacing any
    /// previous entry for the key.
    fn put(&self, key: &str, src: &Path, metadata: &CacheMetadata) -> Result<()>;

    /// Remove one entry. Removing an absent key is not an error.
    fn invalidate(&self, key: &str) -> Result<()>;

    /// Remove every entry whose key starts with `prefix`; returns the count.
    fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;

    /// Every key currently present in the cache.
    fn list_all_keys(&self) -> Result<Vec<String>>;
}

/// Reports transfer progress to the user. Fire-and-forget: the engine
/// guarantees `finish_task` is attempted for every started task, even when
/// the transfer fails.
pub trait ProgressReporter: Send + Sync {
    /// Begin tracking a task; returns the callback to feed byte counts to.
    fn start_task(&self, name: &str, total_bytes: u64) -> ProgressCallback;

    /// Mark a task as complete.
    fn finish_task(&self, name: &str);
}

/// A [`ProgressReporter`] that produces no output. The default everywhere a
/// reporter is optional.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn start_task(&self, _name: &str, _total_bytes: u64) -> ProgressCallback {
        Box::new(|_done, _total| {})
    }

    fn finish_task(&self, _name: &str) {}
}

/// One unit of batch-fetch work: fetches a single dataset and returns its
/// name alongside the outcome. Each task owns a disjoint cache key, so
/// executors need no locking.
pub type FetchTask = Box<dyn FnOnce() -> (String, Result<crate::catalog::FetchResult>) + Send>;

/// Runs independent fetch tasks to completion, optionally in parallel.
///
/// One submit-and-await contract: callers hand over every task and receive
/// every result. Result order is unspecified; callers key by name.
pub trait ExecutorPort: Send + Sync {
    fn run_all(&self, tasks: Vec<FetchTask>) -> Vec<(String, Result<crate::catalog::FetchResult>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_reporter_callback_is_callable() {
        let reporter = NullProgressReporter;
        let cb = reporter.start_task("task", 100);
        cb(50, 100);
        reporter.finish_task("task");
    }
}
