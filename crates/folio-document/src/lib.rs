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

//! Concrete document collaborators behind the `folio-jobs` capability traits.
//!
//! # Design
//! - PDF structure edits run in process on `lopdf`; everything else shells out to
//!   an installed toolchain through [`CommandRunner`], which enforces the time
//!   budget and kills the child on expiry.
//! - Collaborators never decide HTTP semantics. They return `TransformError` and
//!   the job runner classifies it.
//!
//! Layout: `pdf.rs` (lopdf toolkit), `command.rs` (bounded subprocesses),
//! `soffice.rs`, `poppler.rs`, `tesseract.rs`, `translate.rs`.

pub mod command;
pub mod pdf;
pub mod poppler;
pub mod soffice;
pub mod tesseract;
pub mod translate;

pub use command::{CommandOutput, CommandRunner};
pub use pdf::LopdfToolkit;
pub use poppler::PopplerRasterizer;
pub use soffice::SofficeConverter;
pub use tesseract::TesseractOcr;
pub use translate::{HttpTranslator, UnconfiguredTranslator};
