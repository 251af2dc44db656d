//! HTTP surface modules (router, handlers, multipart intake, responses).

/// Operations over a ZIP of documents.
pub mod batch;
/// Shared constants and header names for HTTP surfaces.
pub mod constants;
/// Format conversion endpoints.
pub mod convert;
/// Single-document PDF operations.
pub mod documents;
/// Retrieval of retained work area files.
pub mod download;
/// Problem response helpers and error types.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Streaming file responses.
pub mod response;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
/// Multipart form intake.
pub mod upload;
