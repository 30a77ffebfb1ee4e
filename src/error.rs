//! Error type for the file-backed parts of pomotask.
//!
//! The timer itself never fails; only loading and saving can.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PomoError>;

#[derive(Debug, Error)]
pub enum PomoError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PomoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
