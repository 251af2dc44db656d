//! Shared HTTP constants (headers, problem URIs, streaming sizes).

pub(crate) const HEADER_REQUEST_ID: &str = folio_telemetry::REQUEST_ID_HEADER;
pub(crate) const HEADER_SKIPPED_ITEMS: &str = "x-folio-skipped-items";

pub(crate) const PROBLEM_INTERNAL: &str = "https://folio.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://folio.dev/problems/bad-request";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://folio.dev/problems/forbidden";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://folio.dev/problems/not-found";
pub(crate) const PROBLEM_PAYLOAD_TOO_LARGE: &str = "https://folio.dev/problems/payload-too-large";
pub(crate) const PROBLEM_INVALID_INPUT: &str = "https://folio.dev/problems/invalid-input";
pub(crate) const PROBLEM_INVALID_OPTIONS: &str = "https://folio.dev/problems/invalid-options";
pub(crate) const PROBLEM_ARCHIVE: &str = "https://folio.dev/problems/archive";
pub(crate) const PROBLEM_BATCH_EMPTY: &str = "https://folio.dev/problems/batch-empty";
pub(crate) const PROBLEM_STORAGE: &str = "https://folio.dev/problems/storage";
pub(crate) const PROBLEM_TRANSFORMATION: &str = "https://folio.dev/problems/transformation";
pub(crate) const PROBLEM_TIMEOUT: &str = "https://folio.dev/problems/transformation-timeout";

pub(crate) const STREAM_CHUNK_BYTES: usize = 64 * 1024;
