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

//! Isolated per-job working areas under a single temp-storage root.
//!
//! # Design
//! - Every job gets one directory named by a random UUID; allocation is the only
//!   operation that touches the shared root and relies on `create_dir` failing on
//!   collision rather than on locks.
//! - Client-supplied names never become path components unsanitised. Uploads and
//!   intermediate files live under the reserved `.folio` directory, so the area
//!   root only ever holds outputs named for the client.
//! - Containment checks compare canonical paths component-wise.
//! - Archive extraction and packing stream entry contents instead of buffering.
//!
//! Layout: `area.rs` (allocator, work areas, staging), `archive.rs` (zip codec),
//! `paths.rs` (name sanitisation and containment), `error.rs`.

pub mod archive;
pub mod area;
pub mod error;
pub mod paths;

pub use archive::{extract, pack};
pub use area::{StagedFile, WorkArea, WorkAreaAllocator};
pub use error::{WorkAreaError, WorkAreaResult};
pub use paths::{RESERVED_DIR, is_within, sanitize_extension, sanitize_filename};
