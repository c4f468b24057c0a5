//! Error types for tree mutation and scanning.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a caller breaks the tree's structural contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The path is not below the directory it was resolved against.
    #[error("{path} is not below {dir}")]
    NotDescendant { dir: PathBuf, path: PathBuf },

    /// The item path has no parent directory.
    #[error("No parent directory: {path}")]
    NoParent { path: PathBuf },

    /// The item was not classified as a tracked media kind.
    #[error("Untracked item: {path}")]
    UntrackedItem { path: PathBuf },

    /// Two trees being merged are rooted at different directories.
    #[error("Cannot merge tree rooted at {other} into tree rooted at {root}")]
    RootMismatch { root: PathBuf, other: PathBuf },
}

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is neither a directory nor a regular file.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The external search program could not be run.
    #[error("External search `{program}` failed: {message}")]
    ExternalSearch { program: String, message: String },

    /// A discovered item could not be placed in the tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The scan worker stopped before completing.
    #[error("Scan aborted: {message}")]
    Aborted { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// The external search program reported a failure.
    ExternalSearch,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an I/O error, classifying permission failures.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        if error.kind() == std::io::ErrorKind::PermissionDenied {
            return Self {
                message: format!("Permission denied: {}", path.display()),
                path,
                kind: WarningKind::PermissionDenied,
            };
        }
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }

    /// Create a metadata error warning.
    pub fn metadata_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(path, format!("Metadata error: {error}"), WarningKind::MetadataError)
    }
}
