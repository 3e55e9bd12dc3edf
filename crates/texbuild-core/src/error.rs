//! Error taxonomy for the decision stages that can end a request early.

use std::path::PathBuf;

/// Errors produced before any engine is invoked.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("no main .tex file found in project")]
    NoEntryFile,

    #[error("potentially dangerous command detected: {construct}")]
    UnsafeContent { construct: String },

    #[error("failed to read {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project data: {0}")]
    InvalidProject(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CompileError>;
