//! Capability traits for the collaborators that perform transformations.
//!
//! # Design
//! - The PDF toolkit is synchronous and CPU-bound; [`Toolbox::pdf`] runs it on the
//!   blocking pool.
//! - Subprocess-backed collaborators receive an explicit timeout and must kill
//!   their child process when it expires.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TransformError, TransformResult};
use crate::options::{FormValues, ImageFormat, PageSelection};

/// In-process PDF manipulation.
pub trait PdfToolkit: Send + Sync {
    /// Append every page of `inputs`, in order, into `output`.
    ///
    /// # Errors
    ///
    /// Fails when an input cannot be read or the output cannot be written.
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> TransformResult<()>;

    /// Write one file per range (or per page when `selection` is `None`) into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidRequest`] when a range exceeds the page count.
    fn split(
        &self,
        input: &Path,
        output_dir: &Path,
        selection: Option<&PageSelection>,
        prefix: &str,
    ) -> TransformResult<Vec<PathBuf>>;

    /// Remove every occurrence of `terms` from the page text.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read or written.
    fn redact(&self, input: &Path, output: &Path, terms: &[String]) -> TransformResult<()>;

    /// Drop document-level metadata.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read or written.
    fn scrub_metadata(&self, input: &Path, output: &Path) -> TransformResult<()>;

    /// Fill form fields, optionally locking them.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read or written.
    fn fill_form(
        &self,
        input: &Path,
        output: &Path,
        values: &FormValues,
        flatten: bool,
    ) -> TransformResult<()>;

    /// Extract the text layer, one block per page.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read.
    fn extract_text(&self, input: &Path) -> TransformResult<String>;
}

/// Office-format conversion.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` to `target_format` inside `output_dir`, returning the produced file.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Timeout`] when the budget is exhausted and
    /// [`TransformError::Failed`] when no output appears.
    async fn convert(
        &self,
        input: &Path,
        target_format: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> TransformResult<PathBuf>;
}

/// Rendering parameters for [`Rasterizer::rasterize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    /// Output image format.
    pub format: ImageFormat,
    /// Resolution in dots per inch.
    pub dpi: u32,
}

/// PDF page rendering.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `input` into `output_dir`, returning images in page order.
    ///
    /// # Errors
    ///
    /// Fails when the renderer fails or times out.
    async fn rasterize(
        &self,
        input: &Path,
        output_dir: &Path,
        options: RasterOptions,
        timeout: Duration,
    ) -> TransformResult<Vec<PathBuf>>;
}

/// Optical character recognition.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise the text of one page image.
    ///
    /// # Errors
    ///
    /// Fails when the engine fails or times out.
    async fn recognize(
        &self,
        image: &Path,
        language: &str,
        timeout: Duration,
    ) -> TransformResult<String>;
}

/// Machine translation.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target`; `source` is a hint and may be ignored.
    ///
    /// # Errors
    ///
    /// Fails when the translation service is unreachable or rejects the request.
    async fn translate(&self, text: &str, target: &str, source: &str) -> TransformResult<String>;
}

/// The set of collaborators available to transformations, plus their time budget.
#[derive(Clone)]
pub struct Toolbox {
    pdf: Arc<dyn PdfToolkit>,
    converter: Arc<dyn DocumentConverter>,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    translator: Arc<dyn Translator>,
    timeout: Duration,
}

impl fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolbox")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Toolbox {
    /// Bundle collaborators with the timeout applied to every subprocess call.
    #[must_use]
    pub fn new(
        pdf: Arc<dyn PdfToolkit>,
        converter: Arc<dyn DocumentConverter>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
        translator: Arc<dyn Translator>,
        timeout: Duration,
    ) -> Self {
        Self {
            pdf,
            converter,
            rasterizer,
            ocr,
            translator,
            timeout,
        }
    }

    /// Run a toolkit call on the blocking pool.
    ///
    /// # Errors
    ///
    /// Propagates the toolkit error, or reports a panicked worker as a failure.
    pub async fn pdf<T, F>(&self, operation: &'static str, call: F) -> TransformResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PdfToolkit) -> TransformResult<T> + Send + 'static,
    {
        let toolkit = Arc::clone(&self.pdf);
        tokio::task::spawn_blocking(move || call(toolkit.as_ref()))
            .await
            .map_err(|err| TransformError::failed(operation, format!("worker task failed: {err}")))?
    }

    /// Office converter.
    #[must_use]
    pub fn converter(&self) -> &dyn DocumentConverter {
        self.converter.as_ref()
    }

    /// Page rasterizer.
    #[must_use]
    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    /// OCR engine.
    #[must_use]
    pub fn ocr(&self) -> &dyn OcrEngine {
        self.ocr.as_ref()
    }

    /// Translator.
    #[must_use]
    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Budget for each subprocess invocation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}
