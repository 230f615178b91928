use std::path::PathBuf;

use thiserror::Error;

/// Core error type shared across synthehr crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem failure while reading templates.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A template document is not valid JSON.
    #[error("malformed template {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The discovered template set cannot be used for a run.
    #[error("invalid template set: {0}")]
    InvalidTemplates(String),
}

/// Convenience alias for results returned by synthehr crates.
pub type Result<T> = std::result::Result<T, Error>;
