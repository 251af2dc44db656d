//! Name sanitisation and canonical containment checks.

use std::path::{Component, Path, PathBuf};

use crate::error::{WorkAreaError, WorkAreaResult};

/// Directory inside every work area that holds staged uploads and intermediate
/// files. Client-supplied names can never take this name.
pub const RESERVED_DIR: &str = ".folio";

const MAX_EXTENSION_LEN: usize = 16;
const MAX_FILENAME_BYTES: usize = 255;

/// Lower-cased extension of a client-supplied name, if it is a plain ASCII token.
///
/// Only the final component of `name` is considered, so `../../x.PDF` yields `pdf`.
#[must_use]
pub fn sanitize_extension(name: &str) -> Option<String> {
    let base = last_segment(name);
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.bytes().all(|byte| byte.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// # Errors
///
/// Returns [`WorkAreaError::InvalidName`] when nothing usable remains or the
/// result is [`RESERVED_DIR`].
pub fn sanitize_filename(name: &str) -> WorkAreaResult<String> {
    let cleaned: String = last_segment(name)
        .chars()
        .filter(|ch| !ch.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(WorkAreaError::invalid_name("filename", "empty", name));
    }
    if cleaned.len() > MAX_FILENAME_BYTES {
        return Err(WorkAreaError::invalid_name("filename", "too_long", name));
    }
    if cleaned == RESERVED_DIR {
        return Err(WorkAreaError::invalid_name("filename", "reserved", name));
    }
    Ok(cleaned.to_string())
}

/// Whether `candidate` resolves to `root` or one of its descendants.
///
/// Both paths are canonicalised first, so symlinks are followed and the check
/// is a component-wise ancestor test (`/tmp/area1` does not contain `/tmp/area12`).
///
/// # Errors
///
/// Returns [`WorkAreaError::Storage`] when either path cannot be resolved.
pub fn is_within(root: &Path, candidate: &Path) -> WorkAreaResult<bool> {
    let root = root
        .canonicalize()
        .map_err(|err| WorkAreaError::storage("is_within.root", root, err))?;
    let candidate = candidate
        .canonicalize()
        .map_err(|err| WorkAreaError::storage("is_within.candidate", candidate, err))?;
    Ok(candidate.starts_with(&root))
}

/// Normalise an archive member name into a relative path.
///
/// Absolute names and any `..`, root, or prefix component are rejected.
pub(crate) fn sanitize_archive_path(entry: &str) -> WorkAreaResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() || entry.starts_with('/') || entry.starts_with('\\') {
        return Err(WorkAreaError::invalid_name(
            "archive_member",
            "absolute_path",
            entry,
        ));
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(WorkAreaError::invalid_name(
                    "archive_member",
                    "invalid_segment",
                    entry,
                ));
            }
        }
    }
    if sanitized.as_os_str().is_empty() {
        return Err(WorkAreaError::invalid_name("archive_member", "empty", entry));
    }
    Ok(sanitized)
}

fn last_segment(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fs;

    #[test]
    fn extension_is_taken_from_the_last_segment() {
        assert_eq!(sanitize_extension("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(sanitize_extension("../../x.tar.gz").as_deref(), Some("gz"));
        assert_eq!(sanitize_extension("dir\\scan.JPG").as_deref(), Some("jpg"));
        assert_eq!(sanitize_extension("no_extension"), None);
        assert_eq!(sanitize_extension(".hidden"), None);
        assert_eq!(sanitize_extension("evil.p$f"), None);
        assert_eq!(sanitize_extension("trailing."), None);
    }

    #[test]
    fn filename_is_reduced_to_a_single_component() -> Result<(), Box<dyn Error>> {
        assert_eq!(sanitize_filename("../../merged.pdf")?, "merged.pdf");
        assert_eq!(sanitize_filename("C:\\temp\\out.txt")?, "out.txt");
        assert_eq!(sanitize_filename(" spaced name.pdf ")?, "spaced name.pdf");
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename(&"a".repeat(300)).is_err());
        assert!(sanitize_filename("../.folio").is_err());
        assert_eq!(sanitize_filename(".folio.pdf")?, ".folio.pdf");
        assert_eq!(sanitize_filename("extracted")?, "extracted");
        Ok(())
    }

    #[test]
    fn archive_paths_reject_traversal() -> Result<(), Box<dyn Error>> {
        assert!(sanitize_archive_path("/etc/passwd").is_err());
        assert!(sanitize_archive_path("../../etc/passwd").is_err());
        assert!(sanitize_archive_path("safe/../../escape").is_err());
        assert!(sanitize_archive_path("./").is_err());
        assert_eq!(
            sanitize_archive_path("nested/./file.pdf")?,
            PathBuf::from("nested/file.pdf")
        );
        Ok(())
    }

    #[test]
    fn containment_is_not_a_string_prefix_check() -> Result<(), Box<dyn Error>> {
        let temp = tempfile::tempdir()?;
        let area = temp.path().join("area1");
        let sibling = temp.path().join("area12");
        fs::create_dir_all(&area)?;
        fs::create_dir_all(&sibling)?;
        let inside = area.join("out.pdf");
        let outside = sibling.join("out.pdf");
        fs::write(&inside, b"in")?;
        fs::write(&outside, b"out")?;

        assert!(is_within(&area, &inside)?);
        assert!(!is_within(&area, &outside)?);
        assert!(!is_within(&area, &area.join("..").join("area12").join("out.pdf"))?);
        Ok(())
    }
}
