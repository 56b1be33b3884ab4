//! Error type shared by the indexer, registry, matcher pipeline and auditor.
//!
//! Only input and configuration problems are errors. Per-file indexing
//! failures become [`crate::indexer::IndexWarning`]s and matching is total.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("source root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("source root is not a readable directory: {path}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    MalformedConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config {path}: `{key}` {message}")]
    InvalidConfig {
        path: PathBuf,
        key: String,
        message: String,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed accessibility snapshot {path}: {source}")]
    MalformedSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed mapping hierarchy {path}: {source}")]
    MalformedHierarchy {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
