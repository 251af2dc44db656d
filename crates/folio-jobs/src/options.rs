//! Boundary parsing for operation options.
//!
//! Every helper fails with [`JobError::InvalidOptions`] and performs no I/O, so
//! options can be rejected before any storage is allocated.

use std::collections::BTreeMap;
use std::fmt;

use folio_workarea::sanitize_filename;
use serde_json::Value;

use crate::error::{JobError, JobResult};

/// Form field name to value, as written into `AcroForm` fields.
pub type FormValues = BTreeMap<String, String>;

const MAX_TOKEN_LEN: usize = 32;

/// Parse the JSON array of terms to redact.
///
/// # Errors
///
/// Fails when `raw` is not JSON or not an array of strings.
pub fn parse_terms(raw: &str) -> JobResult<Vec<String>> {
    const FIELD: &str = "terms_to_redact_json";
    let value: Value = serde_json::from_str(raw).map_err(|_| {
        JobError::invalid_options(FIELD, "Invalid JSON format for `terms_to_redact_json`.")
    })?;
    let shape_error =
        || JobError::invalid_options(FIELD, "`terms_to_redact_json` must be a JSON array of strings.");
    let Value::Array(items) = value else {
        return Err(shape_error());
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(term) => Ok(term),
            _ => Err(shape_error()),
        })
        .collect()
}

/// Parse the JSON object of form field values.
///
/// Strings are kept, numbers and booleans are rendered, `null` becomes empty.
///
/// # Errors
///
/// Fails when `raw` is not JSON, not an object, or holds nested values.
pub fn parse_form_data(raw: &str) -> JobResult<FormValues> {
    const FIELD: &str = "form_data_json";
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| JobError::invalid_options(FIELD, "Invalid JSON format for `form_data_json`."))?;
    let Value::Object(entries) = value else {
        return Err(JobError::invalid_options(
            FIELD,
            "`form_data_json` must be a JSON object.",
        ));
    };
    entries
        .into_iter()
        .map(|(name, value)| {
            let rendered = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(JobError::invalid_options(
                        FIELD,
                        format!("Value for form field `{name}` must be a string, number, or boolean."),
                    ));
                }
            };
            Ok((name, rendered))
        })
        .collect()
}

/// Parse a boolean form field (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`).
///
/// # Errors
///
/// Fails for any other value.
pub fn parse_flag(field: &'static str, raw: &str) -> JobResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(JobError::invalid_options(
            field,
            format!("`{field}` must be a boolean."),
        )),
    }
}

/// Validate a short identifier such as a language code or target format.
///
/// # Errors
///
/// Fails when the token is empty, too long, starts with `-`, or contains
/// characters outside ASCII letters, digits, `_`, `+`, and `-`.
pub fn parse_token(field: &'static str, raw: &str) -> JobResult<String> {
    let token = raw.trim();
    let valid = !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && !token.starts_with('-')
        && token
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'+' | b'-'));
    if valid {
        Ok(token.to_string())
    } else {
        Err(JobError::invalid_options(
            field,
            format!("`{field}` must be a short identifier such as `eng` or `pdf`."),
        ))
    }
}

/// Reduce a client-supplied output name to a safe base name.
///
/// # Errors
///
/// Fails when nothing usable remains after sanitisation.
pub fn parse_output_name(field: &'static str, raw: &str) -> JobResult<String> {
    sanitize_filename(raw)
        .map_err(|_| JobError::invalid_options(field, format!("`{field}` must name a file.")))
}

/// Raster format for page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG.
    Jpeg,
}

impl ImageFormat {
    /// Parse `png`, `jpg`, or `jpeg`.
    ///
    /// # Errors
    ///
    /// Fails for any other value.
    pub fn parse(field: &'static str, raw: &str) -> JobResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(JobError::invalid_options(
                field,
                format!("`{field}` must be `png` or `jpg`."),
            )),
        }
    }

    /// File extension written for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// How a multi-file result is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Stream a ZIP archive in the response.
    #[default]
    Archive,
    /// Keep the work area for a while and answer with download links.
    Link,
}

impl Delivery {
    /// Parse `archive` or `link`.
    ///
    /// # Errors
    ///
    /// Fails for any other value.
    pub fn parse(field: &'static str, raw: &str) -> JobResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "archive" | "" => Ok(Self::Archive),
            "link" => Ok(Self::Link),
            _ => Err(JobError::invalid_options(
                field,
                format!("`{field}` must be `archive` or `link`."),
            )),
        }
    }
}

/// Inclusive, one-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// First page.
    pub start: u32,
    /// Last page.
    pub end: u32,
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Ordered list of page ranges such as `1,3,5-7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    ranges: Vec<PageRange>,
}

impl PageSelection {
    /// Parse an optional selection; blank input means "every page".
    ///
    /// # Errors
    ///
    /// Fails on malformed numbers, zero pages, or descending ranges.
    pub fn parse(raw: &str) -> JobResult<Option<Self>> {
        const FIELD: &str = "pages";
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let mut ranges = Vec::new();
        for part in raw.split(',').map(str::trim) {
            let range = if let Some((start, end)) = part.split_once('-') {
                let parse = |value: &str| value.trim().parse::<u32>().ok().filter(|page| *page >= 1);
                let (Some(start), Some(end)) = (parse(start), parse(end)) else {
                    return Err(JobError::invalid_options(
                        FIELD,
                        format!("Invalid page range format: {part}"),
                    ));
                };
                if start > end {
                    return Err(JobError::invalid_options(
                        FIELD,
                        format!("Invalid page range: {part}"),
                    ));
                }
                PageRange { start, end }
            } else {
                let page = part.parse::<u32>().ok().filter(|page| *page >= 1).ok_or_else(|| {
                    JobError::invalid_options(FIELD, format!("Invalid page number format: {part}"))
                })?;
                PageRange {
                    start: page,
                    end: page,
                }
            };
            ranges.push(range);
        }
        Ok(Some(Self { ranges }))
    }

    /// Ranges in request order.
    #[must_use]
    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    /// Check every range against a document of `total` pages.
    ///
    /// # Errors
    ///
    /// Returns a client-safe message naming the first range out of bounds.
    pub fn check_bounds(&self, total: u32) -> Result<(), String> {
        match self.ranges.iter().find(|range| range.end > total) {
            Some(range) if range.start == range.end => {
                Err(format!("Page number out of range: {range}"))
            }
            Some(range) => Err(format!("Invalid page range: {range}")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: &JobError) -> String {
        err.public_detail()
    }

    #[test]
    fn terms_must_be_an_array_of_strings() -> anyhow::Result<()> {
        assert_eq!(parse_terms(r#"["secret", "a b"]"#)?, vec!["secret", "a b"]);
        assert!(parse_terms("[]")?.is_empty());

        let err = parse_terms("not json").err().ok_or_else(|| anyhow::anyhow!("accepted"))?;
        assert_eq!(message(&err), "Invalid JSON format for `terms_to_redact_json`.");

        for shape in [r#"{"a":1}"#, r#"["ok", 3]"#, r#""secret""#] {
            let err = parse_terms(shape).err().ok_or_else(|| anyhow::anyhow!("accepted"))?;
            assert_eq!(
                message(&err),
                "`terms_to_redact_json` must be a JSON array of strings."
            );
        }
        Ok(())
    }

    #[test]
    fn form_data_must_be_a_flat_object() -> anyhow::Result<()> {
        let values = parse_form_data(r#"{"Name":"Ada","Age":36,"Member":true,"Note":null}"#)?;
        assert_eq!(values.get("Name").map(String::as_str), Some("Ada"));
        assert_eq!(values.get("Age").map(String::as_str), Some("36"));
        assert_eq!(values.get("Member").map(String::as_str), Some("true"));
        assert_eq!(values.get("Note").map(String::as_str), Some(""));

        let err = parse_form_data("[1]").err().ok_or_else(|| anyhow::anyhow!("accepted"))?;
        assert_eq!(message(&err), "`form_data_json` must be a JSON object.");
        let err = parse_form_data("{").err().ok_or_else(|| anyhow::anyhow!("accepted"))?;
        assert_eq!(message(&err), "Invalid JSON format for `form_data_json`.");
        assert!(parse_form_data(r#"{"a":{"b":1}}"#).is_err());
        Ok(())
    }

    #[test]
    fn page_selection_parses_singles_and_ranges() -> anyhow::Result<()> {
        let selection =
            PageSelection::parse(" 1, 3 ,5-7")?.ok_or_else(|| anyhow::anyhow!("empty"))?;
        assert_eq!(
            selection.ranges(),
            &[
                PageRange { start: 1, end: 1 },
                PageRange { start: 3, end: 3 },
                PageRange { start: 5, end: 7 },
            ]
        );
        assert!(selection.check_bounds(10).is_ok());
        assert_eq!(
            selection.check_bounds(6),
            Err("Invalid page range: 5-7".to_string())
        );
        assert!(PageSelection::parse("  ")?.is_none());
        Ok(())
    }

    #[test]
    fn page_selection_rejects_bad_syntax() {
        for raw in ["0", "a", "3-1", "1-", "1,,2", "2-x"] {
            assert!(PageSelection::parse(raw).is_err(), "{raw} accepted");
        }
    }

    #[test]
    fn tokens_and_flags() {
        assert_eq!(parse_token("ocr_language", " eng+deu ").ok().as_deref(), Some("eng+deu"));
        assert!(parse_token("target_format", "--outdir").is_err());
        assert!(parse_token("target_format", "pdf;rm").is_err());
        assert!(parse_token("target_format", "").is_err());
        assert_eq!(parse_flag("flatten_form", "TRUE").ok(), Some(true));
        assert_eq!(parse_flag("flatten_form", "off").ok(), Some(false));
        assert!(parse_flag("flatten_form", "maybe").is_err());
        assert_eq!(ImageFormat::parse("output_format", "JPEG").ok(), Some(ImageFormat::Jpeg));
        assert_eq!(Delivery::parse("delivery", "link").ok(), Some(Delivery::Link));
        assert!(Delivery::parse("delivery", "email").is_err());
        assert_eq!(
            parse_output_name("output_filename", "../../etc/out.pdf").ok().as_deref(),
            Some("out.pdf")
        );
        assert!(parse_output_name("output_filename", "..").is_err());
    }
}
