//! Environment loading for [`ServiceConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::defaults;
use crate::error::ConfigResult;
use crate::model::{LogSettings, ServiceConfig, ToolPaths};
use crate::validate::{
    parse_byte_limit, parse_ip, parse_list, parse_log_format, parse_port, parse_positive_secs,
    parse_url,
};

/// Variable selecting the temp-storage root.
pub const ENV_TEMP_FILES_DIR: &str = "TEMP_FILES_DIR";
/// Listener IP address.
pub const ENV_BIND_ADDR: &str = "FOLIO_BIND_ADDR";
/// Listener port.
pub const ENV_HTTP_PORT: &str = "FOLIO_HTTP_PORT";
/// External tool timeout in seconds.
pub const ENV_CONVERSION_TIMEOUT: &str = "FOLIO_CONVERSION_TIMEOUT_SECS";
/// Link-delivery retention in seconds.
pub const ENV_DOWNLOAD_RETENTION: &str = "FOLIO_DOWNLOAD_RETENTION_SECS";
/// Stale-area threshold in seconds.
pub const ENV_STALE_AREA: &str = "FOLIO_STALE_AREA_SECS";
/// Request body limit in bytes.
pub const ENV_MAX_UPLOAD_BYTES: &str = "FOLIO_MAX_UPLOAD_BYTES";
/// Office converter binary.
pub const ENV_SOFFICE_BIN: &str = "FOLIO_SOFFICE_BIN";
/// PDF rasterizer binary.
pub const ENV_PDFTOPPM_BIN: &str = "FOLIO_PDFTOPPM_BIN";
/// OCR engine binary.
pub const ENV_TESSERACT_BIN: &str = "FOLIO_TESSERACT_BIN";
/// Translation endpoint.
pub const ENV_TRANSLATE_URL: &str = "FOLIO_TRANSLATE_URL";
/// Comma-separated CORS origins.
pub const ENV_ALLOWED_ORIGINS: &str = "FOLIO_ALLOWED_ORIGINS";
/// Default log level.
pub const ENV_LOG_LEVEL: &str = "FOLIO_LOG_LEVEL";
/// Log format (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "FOLIO_LOG_FORMAT";

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for any value that fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Unset and blank values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for any value that fails validation.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let temp_root = get(ENV_TEMP_FILES_DIR)
            .map_or_else(|| PathBuf::from(defaults::TEMP_FILES_DIR), PathBuf::from);
        let ip = match get(ENV_BIND_ADDR) {
            Some(value) => parse_ip(ENV_BIND_ADDR, &value)?,
            None => parse_ip(ENV_BIND_ADDR, defaults::BIND_ADDR)?,
        };
        let port = get(ENV_HTTP_PORT)
            .map(|value| parse_port(ENV_HTTP_PORT, &value))
            .transpose()?
            .unwrap_or(defaults::HTTP_PORT);
        let secs = |name: &'static str, default: u64| -> ConfigResult<Duration> {
            get(name)
                .map(|value| parse_positive_secs(name, &value))
                .transpose()
                .map(|parsed| parsed.unwrap_or(Duration::from_secs(default)))
        };
        let tool = |name: &str, default: &str| {
            get(name).map_or_else(|| PathBuf::from(default), PathBuf::from)
        };

        let config = Self {
            temp_root,
            bind_addr: SocketAddr::new(ip, port),
            conversion_timeout: secs(ENV_CONVERSION_TIMEOUT, defaults::CONVERSION_TIMEOUT_SECS)?,
            download_retention: secs(ENV_DOWNLOAD_RETENTION, defaults::DOWNLOAD_RETENTION_SECS)?,
            stale_area_age: secs(ENV_STALE_AREA, defaults::STALE_AREA_SECS)?,
            max_upload_bytes: get(ENV_MAX_UPLOAD_BYTES)
                .map(|value| parse_byte_limit(ENV_MAX_UPLOAD_BYTES, &value))
                .transpose()?
                .unwrap_or(defaults::MAX_UPLOAD_BYTES),
            tools: ToolPaths {
                soffice: tool(ENV_SOFFICE_BIN, defaults::SOFFICE_BIN),
                pdftoppm: tool(ENV_PDFTOPPM_BIN, defaults::PDFTOPPM_BIN),
                tesseract: tool(ENV_TESSERACT_BIN, defaults::TESSERACT_BIN),
            },
            translate_url: get(ENV_TRANSLATE_URL)
                .map(|value| parse_url(ENV_TRANSLATE_URL, &value))
                .transpose()?,
            allowed_origins: get(ENV_ALLOWED_ORIGINS)
                .map(|value| parse_list(&value))
                .unwrap_or_default(),
            log: LogSettings {
                level: get(ENV_LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
                format: get(ENV_LOG_FORMAT)
                    .map(|value| parse_log_format(ENV_LOG_FORMAT, &value))
                    .transpose()?,
            },
        };
        debug!(temp_root = %config.temp_root.display(), bind_addr = %config.bind_addr, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> anyhow::Result<()> {
        let config = ServiceConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config.temp_root, PathBuf::from("temp_files"));
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse()?);
        assert_eq!(config.conversion_timeout, Duration::from_secs(300));
        assert_eq!(config.tools.soffice, PathBuf::from("soffice"));
        assert!(config.translate_url.is_none());
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.log.level, "info");
        assert!(config.log.format.is_none());
        Ok(())
    }

    #[test]
    fn temp_root_comes_from_the_single_recognised_variable() -> anyhow::Result<()> {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("TEMP_FILES_DIR", "/var/lib/folio/tmp"),
            ("FOLIO_HTTP_PORT", "9090"),
            ("FOLIO_CONVERSION_TIMEOUT_SECS", "15"),
            ("FOLIO_ALLOWED_ORIGINS", "http://localhost:3000,http://127.0.0.1:3000"),
            ("FOLIO_TRANSLATE_URL", "http://translate:5000/"),
            ("FOLIO_LOG_FORMAT", "json"),
        ]))?;
        assert_eq!(config.temp_root, PathBuf::from("/var/lib/folio/tmp"));
        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.conversion_timeout, Duration::from_secs(15));
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.translate_url.as_deref(), Some("http://translate:5000"));
        assert_eq!(config.log.format.as_deref(), Some("json"));
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> anyhow::Result<()> {
        let config = ServiceConfig::from_lookup(lookup(&[("TEMP_FILES_DIR", "  ")]))?;
        assert_eq!(config.temp_root, PathBuf::from("temp_files"));
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = ServiceConfig::from_lookup(lookup(&[("FOLIO_CONVERSION_TIMEOUT_SECS", "0")]));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField {
                field: "FOLIO_CONVERSION_TIMEOUT_SECS",
                reason: "zero",
                ..
            })
        ));
        let err = ServiceConfig::from_lookup(lookup(&[("FOLIO_HTTP_PORT", "http")]));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidField {
                field: "FOLIO_HTTP_PORT",
                ..
            })
        ));
    }
}
