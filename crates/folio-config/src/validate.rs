//! Parsing helpers for individual environment values.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port: u16 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "not_a_port"))?;
    if port == 0 {
        return Err(ConfigError::invalid(field, value, "zero"));
    }
    Ok(port)
}

pub(crate) fn parse_ip(field: &'static str, value: &str) -> ConfigResult<IpAddr> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "not_an_ip_address"))
}

pub(crate) fn parse_positive_secs(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "not_an_integer"))?;
    if secs == 0 {
        return Err(ConfigError::invalid(field, value, "zero"));
    }
    Ok(Duration::from_secs(secs))
}

pub(crate) fn parse_byte_limit(field: &'static str, value: &str) -> ConfigResult<usize> {
    let bytes: usize = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "not_an_integer"))?;
    if bytes == 0 {
        return Err(ConfigError::invalid(field, value, "zero"));
    }
    Ok(bytes)
}

pub(crate) fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<String> {
    match value.trim() {
        format @ ("json" | "pretty") => Ok(format.to_string()),
        _ => Err(ConfigError::invalid(field, value, "unknown_format")),
    }
}

pub(crate) fn parse_url(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::invalid(field, value, "not_http_url"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
