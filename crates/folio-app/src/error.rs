//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: folio_config::ConfigError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: folio_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: folio_telemetry::TelemetryError,
    },
    /// Temporary storage could not be prepared.
    #[error("work area storage unavailable")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Source work area error.
        source: folio_workarea::WorkAreaError,
    },
    /// A document collaborator could not be constructed.
    #[error("document collaborator unavailable")]
    Collaborator {
        /// Operation identifier.
        operation: &'static str,
        /// Source transformation error.
        source: folio_jobs::TransformError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: folio_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: folio_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: folio_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn storage(
        operation: &'static str,
        source: folio_workarea::WorkAreaError,
    ) -> Self {
        Self::Storage { operation, source }
    }

    pub(crate) const fn collaborator(
        operation: &'static str,
        source: folio_jobs::TransformError,
    ) -> Self {
        Self::Collaborator { operation, source }
    }
}
