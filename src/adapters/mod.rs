//! Concrete implementations of the catalog's ports.

mod executor;
mod file_cache;
mod fs_storage;
mod router;

pub use executor::{SynchronousExecutor, ThreadPoolExecutor};
pub use file_cache::{CacheStats, FileCache};
pub use fs_storage::FilesystemStorage;
pub use router::{parse_uri_scheme, RouterStorage};
