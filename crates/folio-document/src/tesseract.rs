//! Optical character recognition with the `tesseract` CLI.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use folio_jobs::{OcrEngine, TransformResult};

use crate::command::CommandRunner;

/// [`OcrEngine`] that runs `tesseract <image> stdout -l <language>`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    runner: CommandRunner,
}

impl TesseractOcr {
    /// Use the `tesseract` binary at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            runner: CommandRunner::new(program),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(
        &self,
        image: &Path,
        language: &str,
        timeout: Duration,
    ) -> TransformResult<String> {
        let args: [&OsStr; 4] = [
            image.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(language),
        ];
        let output = self.runner.run("ocr", args, None, timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn returns_recognised_text_for_the_language() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let program = dir.path().join("tesseract");
        std::fs::write(&program, "#!/bin/sh\nprintf 'lang=%s out=%s' \"$4\" \"$2\"\n")?;
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))?;
        let image = dir.path().join("page-1.png");
        std::fs::write(&image, b"png")?;

        let text = TesseractOcr::new(program)
            .recognize(&image, "spa", Duration::from_secs(10))
            .await?;

        assert_eq!(text, "lang=spa out=stdout");
        Ok(())
    }
}
