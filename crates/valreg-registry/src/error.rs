//! Registry error types.

use std::path::PathBuf;

/// Errors that can occur during registry operations.
///
/// A missing package is not an error: lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Version text that is not `MAJOR.MINOR.PATCH` with non-negative integers.
    #[error("invalid version string '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    /// A record with the same name and version already exists.
    #[error("package '{name}@{version}' already published")]
    Conflict { name: String, version: String },

    /// A record that cannot be stored as given.
    #[error("invalid package record: {detail}")]
    InvalidRecord { detail: String },

    /// The underlying storage failed. Not retried internally.
    #[error("storage unavailable at {path}: {detail}")]
    StorageUnavailable { path: PathBuf, detail: String },

    /// The request cannot be processed yet.
    #[error("cannot verify '{name}@{version}': verification is not supported")]
    Unprocessable { name: String, version: String },
}

impl RegistryError {
    pub(crate) fn storage(path: impl Into<PathBuf>, detail: impl std::fmt::Display) -> Self {
        RegistryError::StorageUnavailable {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether this error is a duplicate-key rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistryError::Conflict { .. })
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
