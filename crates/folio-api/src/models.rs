//! Wire types for the folio HTTP API.
//!
//! Successful transformations answer with a file; these types cover everything
//! else: problem documents, health, and the link summary of a retained split.

use chrono::{DateTime, Utc};
use folio_jobs::JobOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Form fields that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer naming the form field, e.g. `/pages`.
    pub pointer: String,
    /// Why the value was rejected.
    pub message: String,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `ok` when the process can answer.
    pub status: String,
    /// Build identifier.
    pub build: String,
    /// Work areas currently on disk.
    pub active_work_areas: usize,
}

/// Greeting served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WelcomeResponse {
    /// Human-readable banner.
    pub message: String,
}

/// One retained file and where to fetch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedFile {
    /// File name inside the work area.
    pub name: String,
    /// Relative URL served by the download endpoint.
    pub download_url: String,
}

/// Answer to `/split` with `delivery=link`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitLinks {
    /// Work area holding the parts.
    pub area_id: Uuid,
    /// Individual parts in output order.
    pub files: Vec<LinkedFile>,
    /// Name of the archive bundling every part.
    pub archive: String,
    /// Relative URL of the archive.
    pub download_url: String,
    /// Moment after which the files are deleted.
    pub expires_at: DateTime<Utc>,
}

impl SplitLinks {
    pub(crate) fn from_outcome(outcome: &JobOutcome, expires_at: DateTime<Utc>) -> Self {
        let area_id = outcome.area().id();
        let files = outcome
            .outputs()
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .map(|name| LinkedFile {
                name: name.to_string(),
                download_url: download_url(area_id, name),
            })
            .collect();
        Self {
            area_id,
            files,
            archive: outcome.download_name().to_string(),
            download_url: download_url(area_id, outcome.download_name()),
            expires_at,
        }
    }
}

fn download_url(area_id: Uuid, name: &str) -> String {
    format!("/download_temp_file/{area_id}/{}", encode_segment(name))
}

/// Percent-encode everything outside the RFC3986 unreserved set.
pub(crate) fn encode_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_details_use_the_rfc_field_names() -> Result<(), serde_json::Error> {
        let problem = ProblemDetails {
            kind: "https://folio.dev/problems/invalid-options".to_string(),
            title: "invalid options".to_string(),
            status: 400,
            detail: None,
            invalid_params: Some(vec![ProblemInvalidParam {
                pointer: "/pages".to_string(),
                message: "Invalid page range format: 3-1".to_string(),
            }]),
        };
        let json = serde_json::to_value(&problem)?;
        assert_eq!(json["type"], "https://folio.dev/problems/invalid-options");
        assert!(json.get("detail").is_none());
        assert_eq!(json["invalid_params"][0]["pointer"], "/pages");
        Ok(())
    }

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("part_1_1-3.pdf"), "part_1_1-3.pdf");
        assert_eq!(encode_segment("annual report.pdf"), "annual%20report.pdf");
        assert_eq!(encode_segment("résumé.pdf"), "r%C3%A9sum%C3%A9.pdf");
    }
}
