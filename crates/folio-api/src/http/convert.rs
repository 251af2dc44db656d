//! `/convert/*` routes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::Response,
    routing::post,
};
use folio_jobs::{
    Convert, ImageFormat, ImagesToPdf, InputKind, Packaging, PdfToImages, PdfToText,
    Transformation,
    options::{parse_output_name, parse_token},
};

use crate::http::errors::ApiError;
use crate::http::response::outcome_response;
use crate::http::upload::{FileRule, non_blank, read_form, require_option, set_output_name};
use crate::state::ApiState;

type Upload = Result<Multipart, MultipartRejection>;

/// Routes mounted under `/convert`.
pub(crate) fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/convert/pdf_to_text", post(pdf_to_text))
        .route("/convert/pdf_to_images", post(pdf_to_images))
        .route("/convert/images_to_pdf", post(images_to_pdf))
        .route("/convert/text_to_pdf", post(text_to_pdf))
        .route("/convert/pptx_to_pdf", post(pptx_to_pdf))
        .route("/convert/any_to_pdf", post(any_to_pdf))
        .route("/convert/pdf_to_pptx", post(pdf_to_pptx))
        .route("/convert/pdf_to_any", post(pdf_to_any))
}

/// Shape of a one-file-in, one-file-out conversion.
struct SingleConversion {
    operation: &'static str,
    input: InputKind,
    default_name: &'static str,
}

impl SingleConversion {
    async fn run(
        &self,
        state: &ApiState,
        multipart: Multipart,
        transformation: &dyn Transformation,
    ) -> Result<Response, ApiError> {
        let mut job = state.runner.begin(self.operation);
        let mut output = self.default_name.to_string();
        read_form(
            multipart,
            &mut job,
            FileRule::single(&["file"], self.input),
            |name, value| match name {
                "output_filename" => set_output_name(&mut output, "output_filename", &value),
                _ => Ok(()),
            },
        )
        .await?;
        job.require_inputs(1, "No file provided.")?;
        let outcome = state
            .runner
            .run(
                job,
                transformation,
                Packaging::Single {
                    download_name: output,
                },
            )
            .await?;
        outcome_response(outcome).await
    }
}

fn to_pdf(operation: &'static str) -> Convert {
    Convert {
        operation,
        target_format: "pdf".to_string(),
    }
}

pub(crate) async fn pdf_to_text(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    SingleConversion {
        operation: "pdf_to_text",
        input: InputKind::Pdf,
        default_name: "extracted_text.txt",
    }
    .run(&state, upload?, &PdfToText)
    .await
}

pub(crate) async fn text_to_pdf(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    SingleConversion {
        operation: "text_to_pdf",
        input: InputKind::Text,
        default_name: "text_document.pdf",
    }
    .run(&state, upload?, &to_pdf("text_to_pdf"))
    .await
}

pub(crate) async fn pptx_to_pdf(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    SingleConversion {
        operation: "pptx_to_pdf",
        input: InputKind::Presentation,
        default_name: "converted_presentation.pdf",
    }
    .run(&state, upload?, &to_pdf("pptx_to_pdf"))
    .await
}

pub(crate) async fn any_to_pdf(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    SingleConversion {
        operation: "any_to_pdf",
        input: InputKind::Convertible,
        default_name: "converted_document.pdf",
    }
    .run(&state, upload?, &to_pdf("any_to_pdf"))
    .await
}

pub(crate) async fn pdf_to_pptx(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let transformation = Convert {
        operation: "pdf_to_pptx",
        target_format: "pptx".to_string(),
    };
    SingleConversion {
        operation: "pdf_to_pptx",
        input: InputKind::Pdf,
        default_name: "converted_slides.pptx",
    }
    .run(&state, upload?, &transformation)
    .await
}

pub(crate) async fn pdf_to_images(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("pdf_to_images");
    let mut format = ImageFormat::Png;
    let mut output = "converted_images.zip".to_string();
    read_form(
        multipart,
        &mut job,
        FileRule::single(&["file"], InputKind::Pdf),
        |name, value| {
            match name {
                "output_format" => {
                    if let Some(raw) = non_blank(value) {
                        format = ImageFormat::parse("output_format", &raw)?;
                    }
                }
                "output_zip_filename" | "output_filename" => {
                    set_output_name(&mut output, "output_zip_filename", &value)?;
                }
                _ => {}
            }
            Ok(())
        },
    )
    .await?;
    job.require_inputs(1, "No file provided.")?;
    let outcome = state
        .runner
        .run(
            job,
            &PdfToImages { format },
            Packaging::Archive {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn images_to_pdf(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("images_to_pdf");
    let mut output = "converted_from_images.pdf".to_string();
    read_form(
        multipart,
        &mut job,
        FileRule::many(&["files", "file"], InputKind::Image),
        |name, value| match name {
            "output_filename" => set_output_name(&mut output, "output_filename", &value),
            _ => Ok(()),
        },
    )
    .await?;
    job.require_inputs(1, "No image files provided.")?;
    let outcome = state
        .runner
        .run(
            job,
            &ImagesToPdf,
            Packaging::Single {
                download_name: output,
            },
        )
        .await?;
    outcome_response(outcome).await
}

pub(crate) async fn pdf_to_any(
    State(state): State<Arc<ApiState>>,
    upload: Upload,
) -> Result<Response, ApiError> {
    let multipart = upload?;
    let mut job = state.runner.begin("pdf_to_any");
    let mut target_format = None;
    let mut requested: Option<String> = None;
    read_form(
        multipart,
        &mut job,
        FileRule::single(&["file"], InputKind::Pdf),
        |name, value| {
            match name {
                "target_format" => {
                    target_format = non_blank(value)
                        .map(|raw| parse_token("target_format", &raw.to_ascii_lowercase()))
                        .transpose()?;
                }
                "output_filename" => {
                    requested = non_blank(value)
                        .map(|raw| parse_output_name("output_filename", &raw))
                        .transpose()?;
                }
                _ => {}
            }
            Ok(())
        },
    )
    .await?;
    let target_format = require_option(&mut job, target_format, "target_format")?;
    job.require_inputs(1, "No file provided.")?;

    let stem = requested.unwrap_or_else(|| {
        job.inputs()
            .first()
            .map_or_else(|| "converted_output".to_string(), |staged| staged.original_stem())
    });
    let download_name = any_output_name(&stem, &target_format);
    let transformation = Convert {
        operation: "pdf_to_any",
        target_format,
    };
    let outcome = state
        .runner
        .run(job, &transformation, Packaging::Single { download_name })
        .await?;
    outcome_response(outcome).await
}

/// `{name}.{format}` unless `name` already carries that extension.
fn any_output_name(name: &str, format: &str) -> String {
    let suffix = format!(".{format}");
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_output_names_gain_the_target_extension_once() {
        assert_eq!(any_output_name("report", "docx"), "report.docx");
        assert_eq!(any_output_name("Report.DOCX", "docx"), "Report.DOCX");
        assert_eq!(any_output_name("report.pdf", "odt"), "report.pdf.odt");
    }
}
