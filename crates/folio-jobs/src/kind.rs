//! Expected input kinds and the upload checks that enforce them.

use std::path::Path;

use folio_workarea::sanitize_extension;

/// Category of file an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Portable Document Format.
    Pdf,
    /// ZIP archive for batch operations.
    Zip,
    /// PNG or JPEG image.
    Image,
    /// Plain text.
    Text,
    /// Slide deck.
    Presentation,
    /// Anything the office converter can turn into a PDF.
    Convertible,
}

impl InputKind {
    /// Extensions accepted for this kind, lower-case and without the dot.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::Zip => &["zip"],
            Self::Image => &["png", "jpg", "jpeg"],
            Self::Text => &["txt"],
            Self::Presentation => &["ppt", "pptx", "odp"],
            Self::Convertible => &[
                "doc", "docx", "odt", "rtf", "xls", "xlsx", "ods", "csv", "ppt", "pptx", "odp",
                "txt", "html", "htm", "png", "jpg", "jpeg",
            ],
        }
    }

    const fn media_types(self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["application/pdf"],
            Self::Zip => &["application/zip", "application/x-zip-compressed"],
            Self::Image => &["image/png", "image/jpeg"],
            Self::Text => &["text/plain"],
            Self::Presentation => &[
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/vnd.ms-powerpoint",
                "application/vnd.oasis.opendocument.presentation",
            ],
            Self::Convertible => &[
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "application/vnd.ms-powerpoint",
                "text/csv",
                "text/plain",
                "image/png",
                "image/jpeg",
            ],
        }
    }

    /// Whether an upload named `filename` with the declared `content_type` fits.
    ///
    /// The extension decides when present; the declared media type is only
    /// consulted for uploads without one.
    #[must_use]
    pub fn accepts(self, filename: &str, content_type: Option<&str>) -> bool {
        match sanitize_extension(filename) {
            Some(ext) => self.extensions().contains(&ext.as_str()),
            None => content_type.is_some_and(|declared| {
                let essence = essence(declared);
                self.media_types()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(essence))
            }),
        }
    }

    /// Name to stage an accepted upload under.
    ///
    /// Uploads accepted by their media type get an extension derived from it, so
    /// extension-driven tools downstream can still tell what they hold.
    #[must_use]
    pub fn staged_name(self, filename: &str, content_type: Option<&str>) -> String {
        if sanitize_extension(filename).is_some() {
            return filename.to_string();
        }
        let Some(guessed) = content_type
            .map(|declared| essence(declared).to_ascii_lowercase())
            .and_then(|essence| mime_guess::get_mime_extensions_str(&essence))
        else {
            return filename.to_string();
        };
        let preferred = self
            .extensions()
            .iter()
            .find(|ext| guessed.contains(*ext))
            .or_else(|| guessed.first());
        match preferred {
            Some(ext) => format!("{filename}.{ext}"),
            None => filename.to_string(),
        }
    }

    /// Whether an extracted archive member belongs to this kind.
    #[must_use]
    pub fn matches_path(self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(sanitize_extension)
            .is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }

    /// Noun used in client messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Zip => "ZIP",
            Self::Image => "image",
            Self::Text => "TXT",
            Self::Presentation => "presentation",
            Self::Convertible => "document",
        }
    }

    /// Client message for an upload that does not fit.
    #[must_use]
    pub fn rejection(self, filename: &str) -> String {
        match self {
            Self::Pdf => format!("File {filename} is not a PDF."),
            Self::Zip => "Input must be a ZIP file.".to_string(),
            Self::Image => "Only JPG or PNG images are allowed.".to_string(),
            Self::Text => "Only TXT files are allowed.".to_string(),
            Self::Presentation => "Only PPTX, PPT, or ODP files are allowed.".to_string(),
            Self::Convertible => {
                format!("Unsupported file type for direct conversion to PDF: {filename}")
            }
        }
    }
}

fn essence(declared: &str) -> &str {
    declared.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_wins_over_declared_type() {
        assert!(InputKind::Pdf.accepts("Report.PDF", Some("application/octet-stream")));
        assert!(!InputKind::Pdf.accepts("report.docx", Some("application/pdf")));
        assert!(InputKind::Zip.accepts("bundle.zip", None));
    }

    #[test]
    fn declared_type_is_a_fallback_for_extensionless_uploads() {
        assert!(InputKind::Pdf.accepts("scan", Some("application/pdf; charset=binary")));
        assert!(!InputKind::Pdf.accepts("scan", Some("text/plain")));
        assert!(!InputKind::Pdf.accepts("scan", None));
    }

    #[test]
    fn extensionless_uploads_are_staged_with_a_derived_extension() {
        assert_eq!(
            InputKind::Pdf.staged_name("scan", Some("application/pdf; charset=binary")),
            "scan.pdf"
        );
        assert_eq!(InputKind::Image.staged_name("photo", Some("IMAGE/JPEG")), "photo.jpg");
        assert_eq!(
            InputKind::Pdf.staged_name("Report.PDF", Some("application/octet-stream")),
            "Report.PDF"
        );
        assert_eq!(InputKind::Pdf.staged_name("scan", None), "scan");
    }

    #[test]
    fn members_match_by_extension_only() {
        assert!(InputKind::Pdf.matches_path(Path::new("/tmp/x/nested/a.Pdf")));
        assert!(!InputKind::Pdf.matches_path(Path::new("/tmp/x/readme.txt")));
        assert!(!InputKind::Pdf.matches_path(Path::new("/tmp/x/pdf")));
    }

    #[test]
    fn rejections_name_the_file_where_useful() {
        assert_eq!(
            InputKind::Pdf.rejection("notes.txt"),
            "File notes.txt is not a PDF."
        );
        assert_eq!(InputKind::Zip.rejection("x.rar"), "Input must be a ZIP file.");
    }
}
