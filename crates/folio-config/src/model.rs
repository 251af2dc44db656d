//! Typed configuration consumed by the rest of the workspace.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Fully validated service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceConfig {
    /// Root directory that holds every work area.
    pub temp_root: PathBuf,
    /// Socket the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Timeout applied to each external tool invocation.
    pub conversion_timeout: Duration,
    /// How long link-delivered work areas survive after the response.
    pub download_retention: Duration,
    /// Leftover areas older than this are removed at boot.
    pub stale_area_age: Duration,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
    /// External tool binaries.
    pub tools: ToolPaths,
    /// Translation endpoint; translation is unavailable when `None`.
    pub translate_url: Option<String>,
    /// Allowed CORS origins; any origin when empty.
    pub allowed_origins: Vec<String>,
    /// Logging preferences.
    pub log: LogSettings,
}

/// Binaries for subprocess-backed collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    /// Office document converter.
    pub soffice: PathBuf,
    /// PDF page rasterizer.
    pub pdftoppm: PathBuf,
    /// OCR engine.
    pub tesseract: PathBuf,
}

/// Logging preferences; the telemetry crate interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// `json`, `pretty`, or `None` to infer from the build profile.
    pub format: Option<String>,
}
