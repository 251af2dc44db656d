//! # Design
//!
//! - Keep error messages constant; capture the operation and path as fields.
//! - Separate storage failures from archive-format failures so callers can map
//!   them to different client-facing categories.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias for work area operations.
pub type WorkAreaResult<T> = Result<T, WorkAreaError>;

/// Errors produced while allocating, staging, or packaging work areas.
#[derive(Debug, Error)]
pub enum WorkAreaError {
    /// Filesystem failures while touching the temp root or a work area.
    #[error("work area storage failure")]
    Storage {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Archive decoding or encoding failures.
    #[error("work area archive failure")]
    Archive {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Archive path involved in the failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Reading the inbound upload stream failed.
    #[error("work area upload stream failure")]
    Upload {
        /// Name suggested by the client for the upload.
        suggested_name: String,
        /// Underlying stream error.
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A name or path failed validation.
    #[error("work area invalid name")]
    InvalidName {
        /// Field that carried the name.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A resolved path escaped the directory it must stay within.
    #[error("work area path escapes its root")]
    Escape {
        /// Resolved path that escaped.
        path: PathBuf,
    },
}

impl WorkAreaError {
    pub(crate) fn storage(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Storage {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn archive(
        operation: &'static str,
        path: &Path,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Archive {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid_name(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidName {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}
