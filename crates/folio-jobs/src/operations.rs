//! The operation catalogue: one [`Transformation`] per endpoint family.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::capability::{RasterOptions, Toolbox};
use crate::error::{TransformError, TransformResult};
use crate::options::{FormValues, ImageFormat, PageSelection};

const OCR_DPI: u32 = 300;
const IMAGE_DPI: u32 = 150;
const OCR_PAGES_DIR: &str = "ocr-pages";
const IMAGE_PAGES_DIR: &str = "pages";
const CONVERTED_DIR: &str = "converted";

/// Where a transformation writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    /// Path for a single-file result. Multi-file transformations ignore it.
    pub file: PathBuf,
    /// Directory for multi-file results that are handed to the client as they are.
    pub parts: PathBuf,
    /// Directory owned by this invocation for intermediate files.
    pub scratch: PathBuf,
}

/// One operation applied to staged inputs.
#[async_trait]
pub trait Transformation: Send + Sync {
    /// Identifier used in logs.
    fn operation(&self) -> &'static str;

    /// Name of the result for archive member `member` in a batch.
    fn batch_output_name(&self, member: &str) -> String {
        member.to_string()
    }

    /// Produce results for `inputs`, returning every file written.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>>;
}

fn single_input<'a>(operation: &'static str, inputs: &'a [PathBuf]) -> TransformResult<&'a Path> {
    match inputs {
        [input] => Ok(input),
        [] => Err(TransformError::failed(operation, "no input file")),
        _ => Err(TransformError::failed(operation, "expected exactly one input file")),
    }
}

fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

async fn ensure_dir(operation: &'static str, dir: &Path) -> TransformResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| TransformError::io(operation, dir, err))
}

async fn write_text(operation: &'static str, path: &Path, text: String) -> TransformResult<()> {
    tokio::fs::write(path, text)
        .await
        .map_err(|err| TransformError::io(operation, path, err))
}

/// Concatenate PDFs in upload order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merge;

#[async_trait]
impl Transformation for Merge {
    fn operation(&self) -> &'static str {
        "merge"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let inputs = inputs.to_vec();
        let output = target.file.clone();
        tools
            .pdf("merge", move |pdf| pdf.merge(&inputs, &output))
            .await?;
        Ok(vec![target.file.clone()])
    }
}

/// Split a PDF by page ranges, or into single pages.
#[derive(Debug, Clone)]
pub struct Split {
    /// Requested ranges; `None` splits every page.
    pub pages: Option<PageSelection>,
    /// Prefix for part names.
    pub prefix: String,
}

#[async_trait]
impl Transformation for Split {
    fn operation(&self) -> &'static str {
        "split"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("split", inputs)?.to_path_buf();
        let dir = target.parts.clone();
        let pages = self.pages.clone();
        let prefix = self.prefix.clone();
        tools
            .pdf("split", move |pdf| {
                pdf.split(&input, &dir, pages.as_ref(), &prefix)
            })
            .await
    }
}

/// Remove terms from page text.
#[derive(Debug, Clone)]
pub struct Redact {
    /// Terms to remove.
    pub terms: Vec<String>,
}

#[async_trait]
impl Transformation for Redact {
    fn operation(&self) -> &'static str {
        "redact"
    }

    fn batch_output_name(&self, member: &str) -> String {
        format!("redacted_{member}")
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("redact", inputs)?.to_path_buf();
        let output = target.file.clone();
        let terms = self.terms.clone();
        tools
            .pdf("redact", move |pdf| pdf.redact(&input, &output, &terms))
            .await?;
        Ok(vec![target.file.clone()])
    }
}

/// Strip document metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrubMetadata;

#[async_trait]
impl Transformation for ScrubMetadata {
    fn operation(&self) -> &'static str {
        "scrub_metadata"
    }

    fn batch_output_name(&self, member: &str) -> String {
        format!("scrubbed_{member}")
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("scrub_metadata", inputs)?.to_path_buf();
        let output = target.file.clone();
        tools
            .pdf("scrub_metadata", move |pdf| pdf.scrub_metadata(&input, &output))
            .await?;
        Ok(vec![target.file.clone()])
    }
}

/// Fill `AcroForm` fields.
#[derive(Debug, Clone)]
pub struct FillForm {
    /// Field values by name.
    pub values: FormValues,
    /// Lock the fields after filling.
    pub flatten: bool,
}

#[async_trait]
impl Transformation for FillForm {
    fn operation(&self) -> &'static str {
        "fill_form"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("fill_form", inputs)?.to_path_buf();
        let output = target.file.clone();
        let values = self.values.clone();
        let flatten = self.flatten;
        tools
            .pdf("fill_form", move |pdf| {
                pdf.fill_form(&input, &output, &values, flatten)
            })
            .await?;
        Ok(vec![target.file.clone()])
    }
}

/// Rasterise, recognise, and optionally translate a PDF into a text file.
#[derive(Debug, Clone)]
pub struct OcrTranslate {
    /// OCR language pack, also used as the translation source hint.
    pub ocr_language: String,
    /// Target language; no translation when `None`.
    pub translate_to: Option<String>,
}

#[async_trait]
impl Transformation for OcrTranslate {
    fn operation(&self) -> &'static str {
        "ocr_translate"
    }

    fn batch_output_name(&self, member: &str) -> String {
        format!("{}.txt", stem_of(member))
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("ocr_translate", inputs)?;
        let pages_dir = target.scratch.join(OCR_PAGES_DIR);
        ensure_dir("ocr.pages_dir", &pages_dir).await?;
        let images = tools
            .rasterizer()
            .rasterize(
                input,
                &pages_dir,
                RasterOptions {
                    format: ImageFormat::Png,
                    dpi: OCR_DPI,
                },
                tools.timeout(),
            )
            .await?;

        let mut parts = Vec::with_capacity(images.len() * 2);
        for (index, image) in images.iter().enumerate() {
            parts.push(format!("\n--- Page {} ---\n", index + 1));
            parts.push(
                tools
                    .ocr()
                    .recognize(image, &self.ocr_language, tools.timeout())
                    .await?,
            );
        }
        let mut text = parts.join("\n");
        if let Some(language) = &self.translate_to {
            text = translate_or_annotate(tools, &text, language, &self.ocr_language).await;
        }
        write_text("ocr.write_output", &target.file, text).await?;
        Ok(vec![target.file.clone()])
    }
}

async fn translate_or_annotate(tools: &Toolbox, text: &str, target: &str, source: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match tools.translator().translate(text, target, source).await {
        Ok(translated) => translated,
        Err(err) => {
            let cause = err.cause();
            warn!(target_language = target, error = %cause, "translation failed; keeping original text");
            format!("Translation failed: {cause}. Original text: {text}")
        }
    }
}

/// Extract the text layer of a PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfToText;

#[async_trait]
impl Transformation for PdfToText {
    fn operation(&self) -> &'static str {
        "pdf_to_text"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("pdf_to_text", inputs)?.to_path_buf();
        let text = tools
            .pdf("pdf_to_text", move |pdf| pdf.extract_text(&input))
            .await?;
        write_text("pdf_to_text.write_output", &target.file, text).await?;
        Ok(vec![target.file.clone()])
    }
}

/// Render each PDF page to an image.
#[derive(Debug, Clone, Copy)]
pub struct PdfToImages {
    /// Image format.
    pub format: ImageFormat,
}

#[async_trait]
impl Transformation for PdfToImages {
    fn operation(&self) -> &'static str {
        "pdf_to_images"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input("pdf_to_images", inputs)?;
        let pages_dir = target.scratch.join(IMAGE_PAGES_DIR);
        ensure_dir("pdf_to_images.pages_dir", &pages_dir).await?;
        tools
            .rasterizer()
            .rasterize(
                input,
                &pages_dir,
                RasterOptions {
                    format: self.format,
                    dpi: IMAGE_DPI,
                },
                tools.timeout(),
            )
            .await
    }
}

/// Convert each image to a PDF page and merge them in upload order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagesToPdf;

#[async_trait]
impl Transformation for ImagesToPdf {
    fn operation(&self) -> &'static str {
        "images_to_pdf"
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        if inputs.is_empty() {
            return Err(TransformError::failed("images_to_pdf", "no input file"));
        }
        let dir = target.scratch.join(CONVERTED_DIR);
        ensure_dir("images_to_pdf.converted_dir", &dir).await?;
        let mut pages = Vec::with_capacity(inputs.len());
        for image in inputs {
            pages.push(
                tools
                    .converter()
                    .convert(image, "pdf", &dir, tools.timeout())
                    .await?,
            );
        }
        let output = target.file.clone();
        tools
            .pdf("images_to_pdf", move |pdf| pdf.merge(&pages, &output))
            .await?;
        Ok(vec![target.file.clone()])
    }
}

/// Office conversion to an arbitrary target format.
#[derive(Debug, Clone)]
pub struct Convert {
    /// Identifier used in logs and errors.
    pub operation: &'static str,
    /// Target extension handed to the converter.
    pub target_format: String,
}

#[async_trait]
impl Transformation for Convert {
    fn operation(&self) -> &'static str {
        self.operation
    }

    async fn apply(
        &self,
        tools: &Toolbox,
        inputs: &[PathBuf],
        target: &OutputTarget,
    ) -> TransformResult<Vec<PathBuf>> {
        let input = single_input(self.operation, inputs)?;
        let dir = target.scratch.join(CONVERTED_DIR);
        ensure_dir("convert.converted_dir", &dir).await?;
        let produced = tools
            .converter()
            .convert(input, &self.target_format, &dir, tools.timeout())
            .await?;
        Ok(vec![produced])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeTranslator, toolbox, toolbox_with_translator};
    use tempfile::TempDir;

    fn target(dir: &TempDir, name: &str) -> OutputTarget {
        OutputTarget {
            file: dir.path().join(name),
            parts: dir.path().to_path_buf(),
            scratch: dir.path().to_path_buf(),
        }
    }

    async fn pdf_input(dir: &TempDir, name: &str, pages: usize) -> anyhow::Result<PathBuf> {
        let path = dir.path().join(name);
        tokio::fs::write(&path, crate::fakes::fake_pdf(pages)).await?;
        Ok(path)
    }

    #[test]
    fn batch_names_follow_the_operation() {
        assert_eq!(
            Redact { terms: Vec::new() }.batch_output_name("a.pdf"),
            "redacted_a.pdf"
        );
        assert_eq!(ScrubMetadata.batch_output_name("a.pdf"), "scrubbed_a.pdf");
        let ocr = OcrTranslate {
            ocr_language: "eng".into(),
            translate_to: None,
        };
        assert_eq!(ocr.batch_output_name("scan.v2.pdf"), "scan.v2.txt");
        assert_eq!(Merge.batch_output_name("a.pdf"), "a.pdf");
    }

    #[tokio::test]
    async fn ocr_joins_pages_with_headers() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = pdf_input(&dir, "in.pdf", 2).await?;
        let target = target(&dir, "out.txt");
        let ocr = OcrTranslate {
            ocr_language: "eng".into(),
            translate_to: None,
        };
        let outputs = ocr.apply(&toolbox(), &[input], &target).await?;
        assert_eq!(outputs, vec![target.file.clone()]);
        let text = tokio::fs::read_to_string(&target.file).await?;
        assert_eq!(
            text,
            "\n--- Page 1 ---\n\ntext of page-1.png\n\n--- Page 2 ---\n\ntext of page-2.png"
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_translation_keeps_the_original_text() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = pdf_input(&dir, "in.pdf", 1).await?;
        let target = target(&dir, "out.txt");
        let ocr = OcrTranslate {
            ocr_language: "eng".into(),
            translate_to: Some("es".into()),
        };
        let tools = toolbox_with_translator(FakeTranslator::Failing);
        ocr.apply(&tools, &[input], &target).await?;
        let text = tokio::fs::read_to_string(&target.file).await?;
        assert!(text.starts_with("Translation failed: service offline. Original text: \n--- Page 1 ---"));
        Ok(())
    }

    #[tokio::test]
    async fn translation_applies_when_requested() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = pdf_input(&dir, "in.pdf", 1).await?;
        let target = target(&dir, "out.txt");
        let ocr = OcrTranslate {
            ocr_language: "eng".into(),
            translate_to: Some("fr".into()),
        };
        let tools = toolbox_with_translator(FakeTranslator::Uppercase);
        ocr.apply(&tools, &[input], &target).await?;
        let text = tokio::fs::read_to_string(&target.file).await?;
        assert!(text.contains("TEXT OF PAGE-1.PNG"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_text_translates_to_empty() {
        let tools = toolbox_with_translator(FakeTranslator::Failing);
        assert_eq!(translate_or_annotate(&tools, "  \n", "es", "eng").await, "");
    }

    #[tokio::test]
    async fn images_are_converted_then_merged() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let first = dir.path().join("a.png");
        let second = dir.path().join("b.jpg");
        tokio::fs::write(&first, b"png").await?;
        tokio::fs::write(&second, b"jpg").await?;
        let target = target(&dir, "album.pdf");
        let outputs = ImagesToPdf
            .apply(&toolbox(), &[first, second], &target)
            .await?;
        assert_eq!(outputs, vec![target.file.clone()]);
        assert!(dir.path().join(CONVERTED_DIR).join("a.pdf").is_file());
        assert!(target.file.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn convert_returns_the_produced_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let input = dir.path().join("deck.pptx");
        tokio::fs::write(&input, b"slides").await?;
        let convert = Convert {
            operation: "pptx_to_pdf",
            target_format: "pdf".into(),
        };
        let outputs = convert
            .apply(&toolbox(), &[input], &target(&dir, "ignored.pdf"))
            .await?;
        assert_eq!(outputs, vec![dir.path().join(CONVERTED_DIR).join("deck.pdf")]);
        Ok(())
    }

    #[tokio::test]
    async fn single_input_operations_reject_multiple_inputs() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let a = pdf_input(&dir, "a.pdf", 1).await?;
        let b = pdf_input(&dir, "b.pdf", 1).await?;
        let result = ScrubMetadata
            .apply(&toolbox(), &[a, b], &target(&dir, "out.pdf"))
            .await;
        assert!(matches!(result, Err(TransformError::Failed { .. })));
        Ok(())
    }
}
