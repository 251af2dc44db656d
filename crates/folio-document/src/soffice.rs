//! Office conversion through a headless LibreOffice.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use folio_jobs::{DocumentConverter, TransformError, TransformResult};
use tracing::{debug, info};

use crate::command::CommandRunner;

const PROFILE_DIR: &str = ".soffice-profile";

/// [`DocumentConverter`] that drives `soffice --convert-to`.
///
/// Each conversion uses a private user profile inside the output directory so
/// concurrent conversions never contend for the shared LibreOffice profile lock.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    runner: CommandRunner,
}

impl SofficeConverter {
    /// Use the LibreOffice binary at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            runner: CommandRunner::new(program),
        }
    }
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(
        &self,
        input: &Path,
        target_format: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> TransformResult<PathBuf> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|err| TransformError::io("convert", output_dir, err))?;
        let profile = output_dir.join(PROFILE_DIR);
        let args: [OsString; 7] = [
            "--headless".into(),
            format!("-env:UserInstallation=file://{}", profile.display()).into(),
            "--convert-to".into(),
            target_format.into(),
            "--outdir".into(),
            output_dir.as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ];
        let output = self
            .runner
            .run("convert", &args, Some(output_dir), timeout)
            .await?;
        debug!(stderr = %output.stderr.trim(), "soffice output");

        let extension = output_extension(target_format);
        let produced = locate_output(input, output_dir, extension).await?;
        info!(
            format = extension,
            output = %produced.file_name().map(|name| name.to_string_lossy()).unwrap_or_default(),
            "document converted"
        );
        Ok(produced)
    }
}

/// Strip a filter suffix such as `pdf:writer_pdf_Export`.
fn output_extension(target_format: &str) -> &str {
    target_format
        .split_once(':')
        .map_or(target_format, |(extension, _)| extension)
}

async fn locate_output(input: &Path, output_dir: &Path, extension: &str) -> TransformResult<PathBuf> {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let expected = output_dir.join(format!("{stem}.{extension}"));
    if tokio::fs::metadata(&expected)
        .await
        .is_ok_and(|meta| meta.is_file())
    {
        return Ok(expected);
    }

    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|err| TransformError::io("convert", output_dir, err))?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| TransformError::io("convert", output_dir, err))?
    {
        let path = entry.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if matches && entry.file_type().await.is_ok_and(|kind| kind.is_file()) {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| {
        TransformError::failed(
            "convert",
            format!("LibreOffice did not produce a {extension} file."),
        )
    })
}
