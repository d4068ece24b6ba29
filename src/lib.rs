//! Declarative data catalog with a local staleness-aware cache.
//!
//! Datasets are declared once (name plus source URI) and fetched through a
//! [`Catalog`], which keeps a local copy alongside a JSON freshness sidecar.
//! On each fetch the remote is probed and the cached copy is reused when its
//! recorded fingerprint (etag, falling back to last-modified) still matches;
//! otherwise it is re-downloaded. Glob sources fan out to one cache entry
//! per matched object, and versioned fetches pin point-in-time snapshots
//! under immutable timestamp-derived keys.
//!
//! Storage backends, the cache store, progress reporting, and batch-fetch
//! execution are all trait seams ([`StoragePort`], [`CachePort`],
//! [`ProgressReporter`], [`ExecutorPort`]), with filesystem-backed defaults
//! in [`adapters`].
//!
//! ```no_run
//! use cachalog::{Catalog, Dataset};
//!
//! fn main() -> cachalog::Result<()> {
//!     let datasets = vec![Dataset::new("customers", "/srv/exports/customers.csv")?];
//!     let catalog = Catalog::from_directory(datasets, None, None)?;
//!     let result = catalog.fetch("customers")?;
//!     if let Some(path) = result.path() {
//!         println!("local copy at {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod catalog;
pub mod config;
pub mod error;
pub mod glob;
pub mod models;
pub mod ports;

mod paths;

pub use catalog::{Catalog, FetchAllOptions, FetchOptions, FetchResult};
pub use error::{CatalogError, Result};
pub use models::{find_version_at, CacheMetadata, Dataset, FileMetadata, ObjectVersion};
pub use ports::{
    CachePort, ExecutorPort, FetchTask, NullProgressReporter, ProgressCallback, ProgressFn,
    ProgressReporter, StoragePort,
};
