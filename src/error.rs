//! Unified filesystem error model shared by the dispatch façade and every adapter.
//! The taxonomy is closed: adapters translate backend-native failures into one of
//! these variants at the boundary rather than leaking their own shapes.

use thiserror::Error;

use crate::adapter::Operation;

/// Coarse error class, for callers that branch on kind without matching
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Invalid,
    NotFound,
    Forbidden,
    Adapter,
    Unknown,
}

#[derive(Debug, Error)]
pub enum FsError {
    // Invalid ---------------------------------------------------------------
    #[error("path escapes the filesystem root: {attempted_path}")]
    PathTraversal { attempted_path: String },
    #[error("absolute paths are not accepted: {absolute_path}")]
    AbsolutePath { absolute_path: String },
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    // NotFound --------------------------------------------------------------
    #[error("file not found: {file_path}")]
    FileNotFound { file_path: String },
    #[error("directory not found: {dir_path}")]
    DirectoryNotFound { dir_path: String },

    // Forbidden -------------------------------------------------------------
    #[error("permission denied for {operation} on {target_path}")]
    PermissionDenied {
        target_path: String,
        operation: Operation,
    },
    #[error("directory not empty: {dir_path}")]
    DirectoryNotEmpty { dir_path: String },
    #[error("not a directory: {path}")]
    NotDirectory { path: String },

    // Adapter ---------------------------------------------------------------
    #[error("adapter {adapter} failed: {reason}")]
    AdapterError { adapter: String, reason: String },
    #[error("operation {operation} is not supported by adapter {adapter}")]
    UnsupportedOperation {
        operation: Operation,
        adapter: String,
    },

    // Unknown ---------------------------------------------------------------
    #[error("unknown filesystem error: {message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FsError::PathTraversal { .. }
            | FsError::AbsolutePath { .. }
            | FsError::InvalidPath { .. } => ErrorClass::Invalid,
            FsError::FileNotFound { .. } | FsError::DirectoryNotFound { .. } => {
                ErrorClass::NotFound
            }
            FsError::PermissionDenied { .. }
            | FsError::DirectoryNotEmpty { .. }
            | FsError::NotDirectory { .. } => ErrorClass::Forbidden,
            FsError::AdapterError { .. } | FsError::UnsupportedOperation { .. } => {
                ErrorClass::Adapter
            }
            FsError::Unknown { .. } => ErrorClass::Unknown,
        }
    }

    pub fn file_not_found<S: Into<String>>(path: S) -> Self {
        FsError::FileNotFound { file_path: path.into() }
    }

    pub fn directory_not_found<S: Into<String>>(path: S) -> Self {
        FsError::DirectoryNotFound { dir_path: path.into() }
    }

    pub fn adapter<A: Into<String>, R: Into<String>>(adapter: A, reason: R) -> Self {
        FsError::AdapterError { adapter: adapter.into(), reason: reason.into() }
    }

    pub fn unsupported<A: Into<String>>(operation: Operation, adapter: A) -> Self {
        FsError::UnsupportedOperation { operation, adapter: adapter.into() }
    }

    /// Last-resort wrapper preserving the underlying cause for diagnostics.
    pub fn unknown<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FsError::Unknown { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

/// Boundary mapping for adapters doing raw I/O: OS error codes fold into the
/// taxonomy; anything without a closer match becomes `Unknown`.
impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => FsError::FileNotFound { file_path: String::new() },
            ErrorKind::PermissionDenied => FsError::PermissionDenied {
                target_path: String::new(),
                operation: Operation::Access,
            },
            _ => FsError::Unknown { message: e.to_string(), source: Some(Box::new(e)) },
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
