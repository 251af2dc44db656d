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

//! Shared test helpers used across the folio crates.
//! Layout: pdf.rs (generated documents), archive.rs (zip builders and readers).

pub mod archive;
pub mod pdf;

pub use archive::{read_zip, write_zip, zip_bytes};
pub use pdf::{PdfFixture, page_count, page_texts};

/// Boxed error used by fixture helpers so callers can `?` any failure.
pub type FixtureError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for fixture helpers.
pub type FixtureResult<T> = Result<T, FixtureError>;
