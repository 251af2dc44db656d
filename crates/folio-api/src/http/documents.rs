//! Single-document PDF operations: merge, split, redact, scrub, fill, OCR.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use folio_jobs::{
    Delivery, FillForm, FormValues, InputKind, Merge, OcrTranslate, Packaging, PageSelection,
    Redact, ScrubMetadata, Split,
    options::{parse_flag, parse_form_data, parse_output_name, parse_terms, parse_token},
};
use tracing::info;

use crate::http::errors::ApiError;
use crate::http::response::outcome_response;
use crate::http::upload::{FileRule, non_blank, read_form, require_option, set_output_name};
use crate::models::SplitLinks;
use crate::state::ApiState;

const PDF_FILE: FileRule = FileRule::single(&["file"], InputKind::Pdf);
const PDF_FILES: FileRule = FileRule::many(&["files"], InputKind::Pdf);

pub(crate) const DEFAULT_SPLIT_PREFIX: &str = "split_part";
pub(crate) const DEFAULT_OCR_LANGUAGE: &str = "eng";

type Upload = Result<Multipart, MultipartRejection>;

pub(crate) async fn merge(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("merge");
    let mut output = "merged_document.pdf".to_string();
    read_form(multipart, &mut job, PDF_FILES, |name, value| match name {
        "output_filename" => set_output_name(&mut output, "output_filename", &value),
        _ => Ok(()),
    })
    .await?;
    job.require_inputs(1, "No files provided for merging.")?;
    job.require_inputs(2, "Please upload at least two PDF files to merge.")?;

    let outcome = state
        .runner
        .run(
            job,
            &Merge,
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn split(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("split");
    let mut pages = None;
    let mut prefix = DEFAULT_SPLIT_PREFIX.to_string();
    let mut delivery = Delivery::default();
    read_form(multipart, &mut job, PDF_FILE, |name, value| {
        match name {
            "pages" => pages = PageSelection::parse(&value)?,
            "output_prefix" => set_output_name(&mut prefix, "output_prefix", &value)?,
            "delivery" => delivery = Delivery::parse("delivery", &value)?,
            _ => {}
        }
        Ok(())
    })
    .await?;
    job.require_inputs(1, "No file provided.")?;

    let stem = job
        .inputs()
        .first()
        .map_or_else(|| "document".to_string(), |staged| staged.original_stem());
    let archive = match parse_output_name("output_prefix", &format!("{stem}_split.zip")) {
        Ok(name) => name,
        Err(err) => return Err(job.fail(err).into()),
    };
    let transformation = Split { pages, prefix };
    let mut outcome = state
        .runner
        .run(
            job,
            &transformation,
            Packaging::Archive {
                download_name: archive,
            },
        )
        .await?;

    match delivery {
        Delivery::Archive => outcome_response(outcome).await,
        Delivery::Link => {
            let retention = state.download_retention;
            let expires_at = chrono::Duration::from_std(retention)
                .ok()
                .and_then(|window| Utc::now().checked_add_signed(window))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            outcome.retain_for(retention);
            let links = SplitLinks::from_outcome(&outcome, expires_at);
            info!(
                job_id = %outcome.job_id(),
                area_id = %links.area_id,
                parts = links.files.len(),
                retention_secs = retention.as_secs(),
                "split parts retained for download"
            );
            drop(outcome.into_guard());
            Ok(Json(links).into_response())
        }
    }
}

pub(crate) async fn redact(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("redact");
    let mut terms = None;
    let mut output = "redacted_document.pdf".to_string();
    read_form(multipart, &mut job, PDF_FILE, |name, value| {
        match name {
            "terms_to_redact_json" | "terms_json" => terms = Some(parse_terms(&value)?),
            "output_filename" => set_output_name(&mut output, "output_filename", &value)?,
            _ => {}
        }
        Ok(())
    })
    .await?;
    let terms = require_option(&mut job, terms, "terms_to_redact_json")?;
    job.require_inputs(1, "No file provided.")?;

    let outcome = state
        .runner
        .run(
            job,
            &Redact { terms },
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn scrub_metadata(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("scrub_metadata");
    let mut output = "scrubbed_document.pdf".to_string();
    read_form(multipart, &mut job, PDF_FILE, |name, value| match name {
        "output_filename" => set_output_name(&mut output, "output_filename", &value),
        _ => Ok(()),
    })
    .await?;
    job.require_inputs(1, "No file provided.")?;

    let outcome = state
        .runner
        .run(
            job,
            &ScrubMetadata,
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn fill_form(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("fill_form");
    let mut values: Option<FormValues> = None;
    let mut flatten = true;
    let mut output = "filled_form.pdf".to_string();
    read_form(multipart, &mut job, PDF_FILE, |name, value| {
        match name {
            "form_data_json" => values = Some(parse_form_data(&value)?),
            "flatten_form" | "flatten" => flatten = parse_flag("flatten_form", &value)?,
            "output_filename" => set_output_name(&mut output, "output_filename", &value)?,
            _ => {}
        }
        Ok(())
    })
    .await?;
    let values = require_option(&mut job, values, "form_data_json")?;
    job.require_inputs(1, "No file provided.")?;

    let outcome = state
        .runner
        .run(
            job,
            &FillForm { values, flatten },
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn ocr_translate(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("ocr_translate");
    let mut options = OcrFields::default();
    let mut output = "extracted_text.txt".to_string();
    read_form(multipart, &mut job, PDF_FILE, |name, value| {
        if name == "output_filename" {
            set_output_name(&mut output, "output_filename", &value)
        } else {
            options.accept(name, value)
        }
    })
    .await?;
    job.require_inputs(1, "No file provided.")?;

    let outcome = state
        .runner
        .run(
            job,
            &options.into_transformation(),
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

/// OCR options shared by the single and batch endpoints.
#[derive(Debug, Default)]
pub(crate) struct OcrFields {
    language: Option<String>,
    translate_to: Option<String>,
}

impl OcrFields {
    pub(crate) fn accept(&mut self, name: &str, value: String) -> folio_jobs::JobResult<()> {
        match name {
            "ocr_language" => {
                self.language = non_blank(value)
                    .map(|raw| parse_token("ocr_language", &raw))
                    .transpose()?;
            }
            "translate_to_language" => {
                self.translate_to = non_blank(value)
                    .map(|raw| parse_token("translate_to_language", &raw))
                    .transpose()?;
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn into_transformation(self) -> OcrTranslate {
        OcrTranslate {
            ocr_language: self
                .language
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            translate_to: self.translate_to,
        }
    }
}
