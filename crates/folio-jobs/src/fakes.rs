//! In-memory collaborators for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::capability::{
    DocumentConverter, OcrEngine, PdfToolkit, RasterOptions, Rasterizer, Toolbox, Translator,
};
use crate::error::{TransformError, TransformResult};
use crate::options::{FormValues, PageSelection};

const HEADER: &[u8] = b"%PDF-fake\n";
const PAGE: &[u8] = b"page\n";

pub(crate) fn fake_pdf(pages: usize) -> Vec<u8> {
    let mut bytes = HEADER.to_vec();
    for _ in 0..pages {
        bytes.extend_from_slice(PAGE);
    }
    bytes
}

fn read_pdf(operation: &'static str, path: &Path) -> TransformResult<usize> {
    let bytes = std::fs::read(path).map_err(|err| TransformError::io(operation, path, err))?;
    if !bytes.starts_with(HEADER) {
        return Err(TransformError::failed(
            operation,
            format!(
                "Error reading PDF file: {}. It might be corrupted or encrypted.",
                path.display()
            ),
        ));
    }
    Ok(bytes[HEADER.len()..].len() / PAGE.len())
}

fn write_pdf(operation: &'static str, path: &Path, pages: usize) -> TransformResult<()> {
    std::fs::write(path, fake_pdf(pages)).map_err(|err| TransformError::io(operation, path, err))
}

pub(crate) struct FakePdf;

impl PdfToolkit for FakePdf {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> TransformResult<()> {
        let mut pages = 0;
        for input in inputs {
            pages += read_pdf("merge", input)?;
        }
        write_pdf("merge", output, pages)
    }

    fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        selection: Option<&PageSelection>,
        prefix: &str,
    ) -> TransformResult<Vec<PathBuf>> {
        let total = read_pdf("split", input)?;
        let mut outputs = Vec::new();
        if let Some(selection) = selection {
            selection
                .check_bounds(u32::try_from(total).unwrap_or(u32::MAX))
                .map_err(|reason| TransformError::InvalidRequest {
                    field: "pages",
                    reason,
                })?;
            for (index, range) in selection.ranges().iter().enumerate() {
                let path = output_dir.join(format!(
                    "{prefix}_{}_{}-{}.pdf",
                    index + 1,
                    range.start,
                    range.end
                ));
                write_pdf("split", &path, (range.end - range.start + 1) as usize)?;
                outputs.push(path);
            }
        } else {
            for index in 0..total {
                let path = output_dir.join(format!("{prefix}_{}.pdf", index + 1));
                write_pdf("split", &path, 1)?;
                outputs.push(path);
            }
        }
        Ok(outputs)
    }

    fn redact(&self, input: &Path, output: &Path, _terms: &[String]) -> TransformResult<()> {
        let pages = read_pdf("redact", input)?;
        write_pdf("redact", output, pages)
    }

    fn scrub_metadata(&self, input: &Path, output: &Path) -> TransformResult<()> {
        let pages = read_pdf("scrub_metadata", input)?;
        write_pdf("scrub_metadata", output, pages)
    }

    fn fill_form(
        &self,
        input: &Path,
        output: &Path,
        _values: &FormValues,
        _flatten: bool,
    ) -> TransformResult<()> {
        let pages = read_pdf("fill_form", input)?;
        write_pdf("fill_form", output, pages)
    }

    fn extract_text(&self, input: &Path) -> TransformResult<String> {
        let pages = read_pdf("pdf_to_text", input)?;
        Ok((1..=pages).map(|page| format!("text {page}\n")).collect())
    }
}

pub(crate) struct FakeConverter;

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert(
        &self,
        input: &Path,
        target_format: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> TransformResult<PathBuf> {
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|err| TransformError::io("convert.read", input, err))?;
        if bytes == b"hang" {
            return Err(TransformError::Timeout {
                operation: "convert",
                timeout,
            });
        }
        let stem = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("converted");
        let output = output_dir.join(format!("{stem}.{target_format}"));
        if target_format == "pdf" {
            write_pdf("convert", &output, 1)?;
        } else {
            std::fs::write(&output, bytes)
                .map_err(|err| TransformError::io("convert.write", &output, err))?;
        }
        Ok(output)
    }
}

pub(crate) struct FakeRasterizer;

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        input: &Path,
        output_dir: &Path,
        options: RasterOptions,
        _timeout: Duration,
    ) -> TransformResult<Vec<PathBuf>> {
        let pages = read_pdf("rasterize", input)?;
        (1..=pages)
            .map(|page| {
                let path = output_dir.join(format!("page-{page}.{}", options.format.extension()));
                std::fs::write(&path, b"img")
                    .map_err(|err| TransformError::io("rasterize", &path, err))?;
                Ok(path)
            })
            .collect()
    }
}

pub(crate) struct FakeOcr;

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(
        &self,
        image: &Path,
        _language: &str,
        _timeout: Duration,
    ) -> TransformResult<String> {
        let name = image
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        Ok(format!("text of {name}"))
    }
}

pub(crate) enum FakeTranslator {
    Uppercase,
    Failing,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, _target: &str, _source: &str) -> TransformResult<String> {
        match self {
            Self::Uppercase => Ok(text.to_uppercase()),
            Self::Failing => Err(TransformError::failed("translate", "service offline")),
        }
    }
}

pub(crate) fn toolbox_with_translator(translator: FakeTranslator) -> Toolbox {
    Toolbox::new(
        Arc::new(FakePdf),
        Arc::new(FakeConverter),
        Arc::new(FakeRasterizer),
        Arc::new(FakeOcr),
        Arc::new(translator),
        Duration::from_secs(5),
    )
}

pub(crate) fn toolbox() -> Toolbox {
    toolbox_with_translator(FakeTranslator::Uppercase)
}
