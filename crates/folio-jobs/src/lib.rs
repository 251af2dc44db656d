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

//! Job execution protocol for document transformations.
//!
//! # Design
//! - A [`Job`] owns at most one work area. It is allocated lazily when the first
//!   upload is staged and released as a unit: inline on failure or drop, deferred
//!   through a [`CleanupGuard`] once a response has been produced.
//! - Transformations are reached through capability traits so the runner never
//!   depends on a concrete toolchain.
//! - Batch jobs skip failing members and fail only when nothing was produced.
//!
//! Layout: `runner.rs` (job state machine), `cleanup.rs` (deferred teardown),
//! `operations.rs` (operation catalogue), `capability.rs` (collaborator traits),
//! `kind.rs` (input kinds), `options.rs` (option parsing), `error.rs`.

pub mod capability;
pub mod cleanup;
pub mod error;
pub mod kind;
pub mod operations;
pub mod options;
pub mod runner;

#[cfg(test)]
mod fakes;

pub use capability::{
    DocumentConverter, OcrEngine, PdfToolkit, RasterOptions, Rasterizer, Toolbox, Translator,
};
pub use cleanup::{CleanupGuard, CleanupScheduler};
pub use error::{JobError, JobErrorKind, JobResult, TransformError, TransformResult};
pub use kind::InputKind;
pub use operations::{
    Convert, FillForm, ImagesToPdf, Merge, OcrTranslate, OutputTarget, PdfToImages, PdfToText,
    Redact, ScrubMetadata, Split, Transformation,
};
pub use options::{Delivery, FormValues, ImageFormat, PageRange, PageSelection};
pub use runner::{Job, JobOutcome, JobRunner, JobState, Packaging};
