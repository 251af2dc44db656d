//! Page rasterisation with poppler's `pdftoppm`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use folio_jobs::{ImageFormat, RasterOptions, Rasterizer, TransformError, TransformResult};
use tracing::debug;

use crate::command::CommandRunner;

const PAGE_PREFIX: &str = "page";

/// [`Rasterizer`] backed by `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    runner: CommandRunner,
}

impl PopplerRasterizer {
    /// Use the `pdftoppm` binary at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            runner: CommandRunner::new(program),
        }
    }
}

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    async fn rasterize(
        &self,
        input: &Path,
        output_dir: &Path,
        options: RasterOptions,
        timeout: Duration,
    ) -> TransformResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|err| TransformError::io("rasterize", output_dir, err))?;
        let format_flag = match options.format {
            ImageFormat::Png => "-png",
            ImageFormat::Jpeg => "-jpeg",
        };
        let dpi = options.dpi.to_string();
        let prefix = output_dir.join(PAGE_PREFIX);
        let args: [&OsStr; 5] = [
            OsStr::new("-r"),
            OsStr::new(&dpi),
            OsStr::new(format_flag),
            input.as_os_str(),
            prefix.as_os_str(),
        ];
        self.runner.run("rasterize", args, None, timeout).await?;

        let pages = rendered_pages(output_dir, options.format.extension()).await?;
        if pages.is_empty() {
            return Err(TransformError::failed(
                "rasterize",
                "pdftoppm produced no page images",
            ));
        }
        debug!(pages = pages.len(), dpi = options.dpi, "pages rendered");
        Ok(pages)
    }
}

/// Rendered pages in page order; `pdftoppm` zero-pads numbers only for long documents.
async fn rendered_pages(output_dir: &Path, extension: &str) -> TransformResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|err| TransformError::io("rasterize", output_dir, err))?;
    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| TransformError::io("rasterize", output_dir, err))?
    {
        let path = entry.path();
        if let Some(number) = page_number(&path, extension) {
            pages.push((number, path));
        }
    }
    pages.sort();
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path, extension: &str) -> Option<u32> {
    if !path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
    {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn page_numbers_ignore_padding_and_strangers() {
        assert_eq!(page_number(Path::new("/x/page-07.png"), "png"), Some(7));
        assert_eq!(page_number(Path::new("/x/page-12.jpg"), "jpg"), Some(12));
        assert_eq!(page_number(Path::new("/x/page-1.jpg"), "png"), None);
        assert_eq!(page_number(Path::new("/x/cover.png"), "png"), None);
    }

    #[tokio::test]
    async fn pages_come_back_in_numeric_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let program = dir.path().join("pdftoppm");
        std::fs::write(
            &program,
            "#!/bin/sh\nfor n in 10 2 1; do echo img > \"$5-$n.png\"; done\n",
        )?;
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))?;
        let input = dir.path().join("doc.pdf");
        std::fs::write(&input, b"%PDF")?;
        let out = dir.path().join("pages");

        let pages = PopplerRasterizer::new(program)
            .rasterize(
                &input,
                &out,
                RasterOptions {
                    format: ImageFormat::Png,
                    dpi: 150,
                },
                Duration::from_secs(10),
            )
            .await?;

        let names: Vec<_> = pages
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
        Ok(())
    }
}
