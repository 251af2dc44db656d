//! # Design
//!
//! - [`JobError`] is the client-facing taxonomy; every variant maps to one
//!   [`JobErrorKind`] and one HTTP status.
//! - [`TransformError`] is what collaborators return. It may mention paths; the
//!   runner scrubs them before a message can reach a response.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_workarea::WorkAreaError;
use thiserror::Error;

/// Result alias for job execution.
pub type JobResult<T> = Result<T, JobError>;

/// Result alias for transformation collaborators.
pub type TransformResult<T> = Result<T, TransformError>;

/// Failure categories exposed to callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobErrorKind {
    /// Wrong media type or extension, or a missing required file.
    InvalidInput,
    /// Malformed or mis-shaped operation options.
    InvalidOptions,
    /// Corrupt archive, or an archive without usable members.
    ArchiveError,
    /// A valid archive produced no output at all.
    BatchEmptyResult,
    /// Temp storage could not be allocated or written.
    StorageError,
    /// A collaborator failed.
    TransformationError,
    /// A collaborator exceeded its time budget and was killed.
    TransformationTimeout,
}

impl JobErrorKind {
    /// Stable identifier used in logs, metrics, and problem types.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidOptions => "invalid_options",
            Self::ArchiveError => "archive_error",
            Self::BatchEmptyResult => "batch_empty_result",
            Self::StorageError => "storage_error",
            Self::TransformationError => "transformation_error",
            Self::TransformationTimeout => "transformation_timeout",
        }
    }

    /// HTTP status code for the category.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::InvalidInput | Self::InvalidOptions | Self::ArchiveError => 400,
            Self::BatchEmptyResult
            | Self::StorageError
            | Self::TransformationError
            | Self::TransformationTimeout => 500,
        }
    }

    /// Whether the caller is at fault.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        self.status_code() < 500
    }
}

/// Errors that terminate a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The upload does not match the expected input kind.
    #[error("job input rejected")]
    InvalidInput {
        /// Client-safe explanation.
        message: String,
    },
    /// An option failed validation.
    #[error("job options rejected")]
    InvalidOptions {
        /// Form field carrying the option.
        field: &'static str,
        /// Client-safe explanation.
        message: String,
    },
    /// The uploaded archive is unreadable or contains nothing usable.
    #[error("job archive rejected")]
    Archive {
        /// Client-safe explanation.
        message: String,
        /// Underlying codec failure when one occurred.
        source: Option<WorkAreaError>,
    },
    /// Every processable batch member failed.
    #[error("batch produced no output")]
    BatchEmpty {
        /// Batch operation identifier.
        operation: &'static str,
        /// Members that were attempted.
        attempted: usize,
    },
    /// Temp storage failure.
    #[error("job storage failure")]
    Storage {
        /// Step that touched storage.
        operation: &'static str,
        /// Underlying work area failure.
        source: WorkAreaError,
    },
    /// A collaborator failed.
    #[error("transformation failed")]
    Transformation {
        /// Operation identifier.
        operation: &'static str,
        /// Cause with filesystem paths reduced to base names.
        message: String,
        /// Original collaborator error, kept for server-side logs.
        source: Option<TransformError>,
    },
    /// A collaborator ran out of time.
    #[error("transformation timed out")]
    Timeout {
        /// Operation identifier.
        operation: &'static str,
        /// Budget that was exceeded.
        timeout: Duration,
    },
}

impl JobError {
    /// Construct an [`JobError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Construct an [`JobError::InvalidOptions`].
    #[must_use]
    pub fn invalid_options(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            field,
            message: message.into(),
        }
    }

    /// Construct an [`JobError::Archive`] without an underlying codec error.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
            source: None,
        }
    }

    /// Failure category.
    #[must_use]
    pub const fn kind(&self) -> JobErrorKind {
        match self {
            Self::InvalidInput { .. } => JobErrorKind::InvalidInput,
            Self::InvalidOptions { .. } => JobErrorKind::InvalidOptions,
            Self::Archive { .. } => JobErrorKind::ArchiveError,
            Self::BatchEmpty { .. } => JobErrorKind::BatchEmptyResult,
            Self::Storage { .. } => JobErrorKind::StorageError,
            Self::Transformation { .. } => JobErrorKind::TransformationError,
            Self::Timeout { .. } => JobErrorKind::TransformationTimeout,
        }
    }

    /// HTTP status code for the failure.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message that is safe to return to the caller.
    #[must_use]
    pub fn public_detail(&self) -> String {
        match self {
            Self::InvalidInput { message }
            | Self::InvalidOptions { message, .. }
            | Self::Archive { message, .. } => message.clone(),
            Self::BatchEmpty { operation, attempted } => format!(
                "No files were successfully processed by {operation} ({attempted} attempted)."
            ),
            Self::Storage { .. } => "Temporary storage is unavailable.".to_string(),
            Self::Transformation {
                operation, message, ..
            } => format!("Failed to {}: {message}", describe(operation)),
            Self::Timeout { operation, timeout } => format!(
                "Failed to {}: timed out after {} seconds.",
                describe(operation),
                timeout.as_secs()
            ),
        }
    }

    /// Translate a work area failure raised during `operation`.
    #[must_use]
    pub fn from_workarea(operation: &'static str, err: WorkAreaError) -> Self {
        match err {
            WorkAreaError::Archive { .. } => Self::Archive {
                message: "Uploaded file is not a valid ZIP archive.".to_string(),
                source: Some(err),
            },
            WorkAreaError::Upload { .. } => {
                Self::invalid_input("The upload stream ended unexpectedly.")
            }
            WorkAreaError::InvalidName { field, .. } => {
                Self::invalid_options(field, format!("`{field}` must name a file."))
            }
            WorkAreaError::Storage { .. } | WorkAreaError::Escape { .. } => Self::Storage {
                operation,
                source: err,
            },
        }
    }

    /// Translate a collaborator failure, reducing any path under `root` to its base name.
    #[must_use]
    pub fn from_transform(operation: &'static str, err: TransformError, root: &Path) -> Self {
        match err {
            TransformError::Timeout { timeout, .. } => Self::Timeout { operation, timeout },
            TransformError::InvalidRequest { field, reason } => Self::InvalidOptions {
                field,
                message: reason,
            },
            other => Self::Transformation {
                operation,
                message: scrub_paths(&other.cause(), root),
                source: Some(other),
            },
        }
    }
}

/// Errors returned by transformation collaborators.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The collaborator reported a failure.
    #[error("transformation failed")]
    Failed {
        /// Step that failed.
        operation: &'static str,
        /// Collaborator-provided cause.
        message: String,
    },
    /// The collaborator exceeded its time budget.
    #[error("transformation timed out")]
    Timeout {
        /// Step that timed out.
        operation: &'static str,
        /// Budget that was exceeded.
        timeout: Duration,
    },
    /// The options are valid in shape but not for this document.
    #[error("transformation request rejected")]
    InvalidRequest {
        /// Form field the rejection refers to.
        field: &'static str,
        /// Client-safe reason.
        reason: String,
    },
    /// Filesystem failure inside a collaborator.
    #[error("transformation io failure")]
    Io {
        /// Step that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TransformError {
    /// Construct a [`TransformError::Failed`].
    #[must_use]
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }

    /// Construct a [`TransformError::Io`].
    #[must_use]
    pub fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Human-readable cause, without the filesystem path of IO failures.
    #[must_use]
    pub fn cause(&self) -> String {
        match self {
            Self::Failed { message, .. } => message.clone(),
            Self::Timeout { timeout, .. } => {
                format!("timed out after {} seconds", timeout.as_secs())
            }
            Self::InvalidRequest { reason, .. } => reason.clone(),
            Self::Io {
                operation, source, ..
            } => format!("{operation}: {source}"),
        }
    }
}

fn describe(operation: &str) -> String {
    operation.replace('_', " ")
}

/// Replace every path rooted at `root` inside `message` with its base name.
pub(crate) fn scrub_paths(message: &str, root: &Path) -> String {
    let root = root.to_string_lossy();
    if root.is_empty() {
        return message.to_string();
    }
    let mut scrubbed = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(index) = rest.find(root.as_ref()) {
        scrubbed.push_str(&rest[..index]);
        let tail = &rest[index + root.len()..];
        let end = tail
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | ')' | ':' | ';'))
            .unwrap_or(tail.len());
        let base = tail[..end].rsplit(['/', '\\']).next().unwrap_or_default();
        scrubbed.push_str(base);
        rest = &tail[end..];
    }
    scrubbed.push_str(rest);
    scrubbed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn kinds_map_to_the_documented_statuses() {
        let cases = [
            (JobError::invalid_input("x"), 400),
            (JobError::invalid_options("pages", "x"), 400),
            (JobError::archive("x"), 400),
            (
                JobError::BatchEmpty {
                    operation: "batch_redact",
                    attempted: 3,
                },
                500,
            ),
            (
                JobError::Timeout {
                    operation: "any_to_pdf",
                    timeout: Duration::from_secs(5),
                },
                500,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{:?}", err.kind());
        }
        assert!(JobErrorKind::ArchiveError.is_client_error());
        assert!(!JobErrorKind::BatchEmptyResult.is_client_error());
    }

    #[test]
    fn transformation_detail_never_contains_the_temp_root() {
        let root = Path::new("/srv/folio/temp");
        let err = TransformError::failed(
            "merge",
            "Error reading PDF file: /srv/folio/temp/7f0c/ab12.pdf. It might be corrupted",
        );
        let job = JobError::from_transform("merge", err, root);
        let detail = job.public_detail();
        assert_eq!(
            detail,
            "Failed to merge: Error reading PDF file: ab12.pdf. It might be corrupted"
        );
        assert!(job.source().is_some());
    }

    #[test]
    fn io_causes_omit_paths_and_timeouts_keep_their_kind() {
        let err = TransformError::io(
            "redact.write",
            Path::new("/srv/folio/temp/a/out.pdf"),
            io::Error::other("disk full"),
        );
        assert_eq!(err.cause(), "redact.write: disk full");

        let timeout = TransformError::Timeout {
            operation: "soffice",
            timeout: Duration::from_secs(30),
        };
        let job = JobError::from_transform("pdf_to_any", timeout, Path::new("/tmp"));
        assert_eq!(job.kind(), JobErrorKind::TransformationTimeout);
        assert_eq!(
            job.public_detail(),
            "Failed to pdf to any: timed out after 30 seconds."
        );
    }

    #[test]
    fn invalid_requests_become_option_errors() {
        let err = TransformError::InvalidRequest {
            field: "pages",
            reason: "Page number out of range: 12".to_string(),
        };
        let job = JobError::from_transform("split", err, Path::new("/tmp"));
        assert!(matches!(job, JobError::InvalidOptions { field: "pages", .. }));
        assert_eq!(job.public_detail(), "Page number out of range: 12");
    }

    #[test]
    fn workarea_failures_are_classified() {
        let archive = JobError::from_workarea(
            "extract",
            WorkAreaError::Archive {
                operation: "extract.open",
                path: PathBuf::from("/tmp/x.zip"),
                source: zip::result::ZipError::InvalidArchive("bad"),
            },
        );
        assert_eq!(archive.kind(), JobErrorKind::ArchiveError);

        let storage = JobError::from_workarea(
            "allocate",
            WorkAreaError::Storage {
                operation: "allocate.create_dir",
                path: PathBuf::from("/tmp/root"),
                source: io::Error::other("read-only"),
            },
        );
        assert_eq!(storage.kind(), JobErrorKind::StorageError);
        assert_eq!(storage.public_detail(), "Temporary storage is unavailable.");
    }

    #[test]
    fn scrub_paths_handles_multiple_occurrences() {
        let root = Path::new("/t");
        assert_eq!(
            scrub_paths("copy /t/a/b.pdf -> '/t/c/d.zip'", root),
            "copy b.pdf -> 'd.zip'"
        );
        assert_eq!(scrub_paths("no paths here", root), "no paths here");
    }
}
