use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checksum mismatch for {path}: expected {expected}, found {actual}")]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Unexpected shape: {0}")]
    Shape(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, SiteError>;
