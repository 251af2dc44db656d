//! RFC9457-style API error wrapper.

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use folio_jobs::{JobError, JobErrorKind};
use folio_telemetry::{current_request_id, current_route};
use tracing::error;

use crate::http::constants::{
    PROBLEM_ARCHIVE, PROBLEM_BAD_REQUEST, PROBLEM_BATCH_EMPTY, PROBLEM_FORBIDDEN,
    PROBLEM_INTERNAL, PROBLEM_INVALID_INPUT, PROBLEM_INVALID_OPTIONS, PROBLEM_NOT_FOUND,
    PROBLEM_PAYLOAD_TOO_LARGE, PROBLEM_STORAGE, PROBLEM_TIMEOUT, PROBLEM_TRANSFORMATION,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            PROBLEM_PAYLOAD_TOO_LARGE,
            "payload too large",
        )
        .with_detail(detail)
    }

    /// Map a multipart decoding failure, keeping the size-limit status distinct.
    pub(crate) fn from_multipart(status: StatusCode, detail: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::payload_too_large(detail)
        } else {
            Self::bad_request(detail)
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let (status, kind, title) = match err.kind() {
            JobErrorKind::InvalidInput => {
                (StatusCode::BAD_REQUEST, PROBLEM_INVALID_INPUT, "invalid input")
            }
            JobErrorKind::InvalidOptions => (
                StatusCode::BAD_REQUEST,
                PROBLEM_INVALID_OPTIONS,
                "invalid options",
            ),
            JobErrorKind::ArchiveError => {
                (StatusCode::BAD_REQUEST, PROBLEM_ARCHIVE, "archive rejected")
            }
            JobErrorKind::BatchEmptyResult => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_BATCH_EMPTY,
                "batch produced no output",
            ),
            JobErrorKind::StorageError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_STORAGE,
                "temporary storage unavailable",
            ),
            JobErrorKind::TransformationError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_TRANSFORMATION,
                "transformation failed",
            ),
            JobErrorKind::TransformationTimeout => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PROBLEM_TIMEOUT,
                "transformation timed out",
            ),
        };
        let api = Self::new(status, kind, title).with_detail(err.public_detail());
        match err {
            JobError::InvalidOptions { field, message } => {
                api.with_invalid_params(vec![ProblemInvalidParam {
                    pointer: format!("/{field}"),
                    message,
                }])
            }
            _ => api,
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::from_multipart(rejection.status(), rejection.body_text())
    }
}

impl From<&MultipartError> for ApiError {
    fn from(err: &MultipartError) -> Self {
        Self::from_multipart(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                request_id = %current_request_id().unwrap_or_default(),
                route = %current_route().unwrap_or_default(),
                problem = self.kind,
                detail = self.detail.as_deref().unwrap_or_default(),
                "request failed"
            );
        }
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        let mut response = (self.status, Json(body)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
