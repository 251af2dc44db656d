#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the folio workspace.
//!
//! Logging, request-id propagation, and Prometheus metrics live here so the API
//! surface and the job runner report through one consistent channel.
//!
//! Layout: `init.rs` (subscriber setup), `layers.rs` (request ids),
//! `context.rs` (request-scoped context), `metrics.rs`, `error.rs`.

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::{GlobalContextGuard, current_request_id, current_route, with_request_context};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{REQUEST_ID_HEADER, RequestIdLayers, request_id_layers};
pub use metrics::{Metrics, MetricsSnapshot};
