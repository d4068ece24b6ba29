//! Error types for cachalog.
//!
//! Every failure the library can surface is a variant of [`CatalogError`],
//! so callers can catch any library failure with a single match arm. Backend
//! adapters translate their native failures into this vocabulary at the
//! adapter boundary; the catalog itself never retries.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The requested dataset is not registered in the catalog.
    #[error("Dataset '{name}' not found")]
    DatasetNotFound {
        name: String,
        /// Names of the datasets that are registered.
        available: Vec<String>,
    },

    // Storage errors, translated from backend-specific failures.
    #[error("Not found in storage: {source_uri}")]
    StorageNotFound { source_uri: String },

    #[error("Access denied to storage: {source_uri}")]
    StorageAccessDenied { source_uri: String },

    #[error("Storage error for {source_uri}: {message}")]
    Storage {
        message: String,
        source_uri: String,
    },

    /// A cache metadata sidecar exists but cannot be parsed. This is
    /// corruption, never downgraded to a miss.
    #[error("Cache metadata corrupt for '{key}' at {path}")]
    CacheCorrupt { key: String, path: PathBuf },

    /// A glob dataset matched zero remote files.
    #[error("Glob pattern '{pattern}' matched no files under '{prefix}'")]
    EmptyGlobMatch { pattern: String, prefix: String },

    /// No version of the dataset existed at the requested instant.
    #[error("No version of '{name}' existed at {as_of}")]
    VersionNotFound {
        name: String,
        as_of: DateTime<Utc>,
    },

    /// Version listing or version-addressed fetch against a backend that
    /// cannot enumerate versions (the filesystem backend never can).
    #[error("Storage backend '{backend}' does not support versioning")]
    VersioningNotSupported { backend: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Caller contract violation (empty dataset name, conflicting
    /// addressing modes, version fetch on a glob dataset, ...).
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Local I/O and serialization failures.
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CatalogError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation {
            message: message.into(),
        }
    }

    /// Optional guidance on how to resolve this error.
    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            CatalogError::DatasetNotFound { available, .. } => {
                if available.is_empty() {
                    Some("Check Catalog::datasets() for registered names".to_string())
                } else {
                    Some(format!("Available datasets: {}", available.join(", ")))
                }
            }
            CatalogError::StorageNotFound { source_uri } => {
                Some(format!("Verify the source path exists: {source_uri}"))
            }
            CatalogError::StorageAccessDenied { .. } => {
                Some("Check credentials and bucket/path permissions".to_string())
            }
            CatalogError::CacheCorrupt { key, .. } => {
                Some(format!("Delete cache files for '{key}' and re-fetch"))
            }
            CatalogError::EmptyGlobMatch { prefix, .. } => {
                Some(format!("Verify files exist under '{prefix}' and the pattern is correct"))
            }
            CatalogError::VersionNotFound { .. } => {
                Some("Use versions() to list the available version history".to_string())
            }
            CatalogError::VersioningNotSupported { .. } => {
                Some("Use a versioned storage backend, or fetch latest".to_string())
            }
            _ => None,
        }
    }
}
