//! Machine translation against a LibreTranslate-compatible HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use folio_jobs::{TransformError, TransformResult, Translator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const AUTO_DETECT: &str = "auto";

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

#[derive(Deserialize)]
struct TranslateFailure {
    error: String,
}

/// [`Translator`] that posts to `{base_url}/translate`.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
}

impl HttpTranslator {
    /// Build a translator for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> TransformResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            TransformError::failed("translate", format!("cannot build http client: {err}"))
        })?;
        Ok(Self {
            client,
            endpoint: format!("{}/translate", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target: &str, source: &str) -> TransformResult<String> {
        let request = TranslateRequest {
            q: text,
            source: source_hint(source),
            target,
            format: "text",
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                TransformError::failed("translate", format!("translation service unreachable: {err}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<TranslateFailure>()
                .await
                .map_or_else(|_| status.to_string(), |failure| failure.error);
            return Err(TransformError::failed(
                "translate",
                format!("translation service rejected the request: {reason}"),
            ));
        }
        let body: TranslateResponse = response.json().await.map_err(|err| {
            TransformError::failed("translate", format!("malformed translation response: {err}"))
        })?;
        debug!(target_language = target, chars = text.len(), "text translated");
        Ok(body.translated_text)
    }
}

/// LibreTranslate expects ISO 639-1 codes; tesseract codes such as `eng` fall back to detection.
fn source_hint(source: &str) -> &str {
    if source.len() == 2 && source.bytes().all(|byte| byte.is_ascii_lowercase()) {
        source
    } else {
        AUTO_DETECT
    }
}

/// [`Translator`] used when no translation endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTranslator;

#[async_trait]
impl Translator for UnconfiguredTranslator {
    async fn translate(&self, _text: &str, _target: &str, _source: &str) -> TransformResult<String> {
        Err(TransformError::failed(
            "translate",
            "translation service is not configured",
        ))
    }
}
