//! ZIP-in, ZIP-out batch endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    response::Response,
};
use folio_jobs::{InputKind, Redact, ScrubMetadata, Transformation, options::parse_terms};

use crate::http::documents::OcrFields;
use crate::http::errors::ApiError;
use crate::http::response::outcome_response;
use crate::http::upload::{FileRule, read_form, require_option, set_output_name};
use crate::state::ApiState;

const ZIP_FILE: FileRule = FileRule::single(&["zip_file", "file"], InputKind::Zip);

type Upload = Result<Multipart, MultipartRejection>;

pub(crate) async fn batch_redact(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("batch_redact");
    let mut terms = None;
    let mut output = "redacted_pdfs.zip".to_string();
    read_form(multipart, &mut job, ZIP_FILE, |name, value| {
        match name {
            "terms_to_redact_json" | "terms_json" => terms = Some(parse_terms(&value)?),
            "output_zip_filename" => set_output_name(&mut output, "output_zip_filename", &value)?,
            _ => {}
        }
        Ok(())
    })
    .await?;
    let terms = require_option(&mut job, terms, "terms_to_redact_json")?;
    job.require_inputs(1, "No ZIP file provided.")?;
    run_members(&state, job, &Redact { terms }, &output).await
}

pub(crate) async fn batch_ocr_translate(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("batch_ocr_translate");
    let mut options = OcrFields::default();
    let mut output = "ocr_translated_texts.zip".to_string();
    read_form(multipart, &mut job, ZIP_FILE, |name, value| {
        if name == "output_zip_filename" {
            set_output_name(&mut output, "output_zip_filename", &value)
        } else {
            options.accept(name, value)
        }
    })
    .await?;
    job.require_inputs(1, "No ZIP file provided.")?;
    run_members(&state, job, &options.into_transformation(), &output).await
}

pub(crate) async fn batch_scrub_metadata(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("batch_scrub_metadata");
    let mut output = "scrubbed_pdfs.zip".to_string();
    read_form(multipart, &mut job, ZIP_FILE, |name, value| match name {
        "output_zip_filename" => set_output_name(&mut output, "output_zip_filename", &value),
        _ => Ok(()),
    })
    .await?;
    job.require_inputs(1, "No ZIP file provided.")?;
    run_members(&state, job, &ScrubMetadata, &output).await
}

async fn run_members(
    state: &ApiState,
    job: folio_jobs::Job,
    transformation: &dyn Transformation,
    download_name: &str,
) -> Result<Response, ApiError> {
    let outcome = state
        .runner
        .run_batch(job, transformation, InputKind::Pdf, download_name)
        .await?;
    outcome_response(outcome).await
}
