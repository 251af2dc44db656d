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
#![allow(clippy::redundant_pub_crate)]

//! HTTP surface for the folio document service.
//!
//! # Design
//! - Every transformation endpoint is a thin adapter: read the multipart form into
//!   a job, hand it to the runner, stream the outcome back.
//! - The cleanup guard of a successful job rides inside the response body, so the
//!   work area disappears only after the transport is done with the file.
//! - Failures render as RFC9457 problem documents.
//!
//! Layout: `http/router.rs` (server host), `http/upload.rs` (multipart intake),
//! `http/response.rs` (file streaming), `http/{documents,batch,convert,download,health}.rs`
//! (handlers), `models.rs` (wire types), `state.rs`, `error.rs`.

pub mod error;
pub mod http;
pub mod models;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
