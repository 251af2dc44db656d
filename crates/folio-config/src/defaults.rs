//! Default values applied when an environment variable is unset.

/// Temp-storage root, relative to the working directory.
pub const TEMP_FILES_DIR: &str = "temp_files";
/// Listener address.
pub const BIND_ADDR: &str = "0.0.0.0";
/// Listener port.
pub const HTTP_PORT: u16 = 8000;
/// Upper bound for any external tool invocation.
pub const CONVERSION_TIMEOUT_SECS: u64 = 300;
/// Retention for areas delivered by download link.
pub const DOWNLOAD_RETENTION_SECS: u64 = 600;
/// Age after which leftover areas are swept at boot.
pub const STALE_AREA_SECS: u64 = 3600;
/// Request body limit (256 MiB).
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;
/// Office converter binary.
pub const SOFFICE_BIN: &str = "soffice";
/// PDF rasterizer binary.
pub const PDFTOPPM_BIN: &str = "pdftoppm";
/// OCR engine binary.
pub const TESSERACT_BIN: &str = "tesseract";
/// Log level used when neither `RUST_LOG` nor `FOLIO_LOG_LEVEL` is set.
pub const LOG_LEVEL: &str = "info";
