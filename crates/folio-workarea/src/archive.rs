//! Zip extraction into a work area and packaging of outputs.
//!
//! # Design
//! - Members that would resolve outside the destination are skipped with a warning,
//!   never written. Resolution is re-checked on canonical parents so pre-existing
//!   symlinks cannot redirect writes.
//! - A member that cannot be placed (its path clashes with an earlier member) is
//!   skipped too; the rest of the archive is still extracted.
//! - Entry contents are streamed with `io::copy`; nothing is read whole into memory.
//! - Packing flattens to base names and tolerates inputs that vanished before packing.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{WorkAreaError, WorkAreaResult};
use crate::paths::sanitize_archive_path;

/// Extract every file member of `zip_path` beneath `destination`.
///
/// Relative member paths are kept. Directory entries are created implicitly and
/// not returned. Members whose resolved path leaves `destination`, or whose
/// path cannot be created, are skipped.
///
/// # Errors
///
/// - [`WorkAreaError::Archive`] when the input is not a readable zip archive.
/// - [`WorkAreaError::Storage`] when the destination is unusable or member
///   content cannot be written.
pub fn extract(zip_path: &Path, destination: &Path) -> WorkAreaResult<Vec<PathBuf>> {
    let file = File::open(zip_path)
        .map_err(|err| WorkAreaError::storage("extract.open", zip_path, err))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| WorkAreaError::archive("extract.decode", zip_path, err))?;
    let root = destination
        .canonicalize()
        .map_err(|err| WorkAreaError::storage("extract.canonicalize", destination, err))?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| WorkAreaError::archive("extract.read_entry", zip_path, err))?;
        if entry.is_dir() {
            continue;
        }
        let member = entry.name().to_string();
        let Ok(relative) = sanitize_archive_path(&member) else {
            warn!(member = %member, "skipping archive member outside destination");
            continue;
        };
        let target = match resolve_member(&root, &relative) {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(member = %member, "skipping archive member redirected outside destination");
                continue;
            }
            Err(err) => {
                warn!(member = %member, error = %err, "skipping archive member that cannot be placed");
                continue;
            }
        };

        let output = match File::create(&target) {
            Ok(output) => output,
            Err(err) => {
                warn!(member = %member, error = %err, "skipping archive member that cannot be created");
                continue;
            }
        };
        let mut writer = BufWriter::new(output);
        io::copy(&mut entry, &mut writer).map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => {
                WorkAreaError::archive("extract.copy", zip_path, ZipError::Io(err))
            }
            _ => WorkAreaError::storage("extract.copy", &target, err),
        })?;
        extracted.push(target);
    }

    debug!(members = extracted.len(), "archive extracted");
    Ok(extracted)
}

/// Write `files` into a new deflate archive at `output`, flattened to base names.
///
/// Inputs that no longer exist are skipped with a warning. Repeated base names
/// receive a ` (n)` suffix.
///
/// # Errors
///
/// Returns [`WorkAreaError::Archive`] when the archive cannot be created or written.
pub fn pack(files: &[PathBuf], output: &Path) -> WorkAreaResult<PathBuf> {
    let sink = File::create(output)
        .map_err(|err| WorkAreaError::archive("pack.create", output, ZipError::Io(err)))?;
    let mut zip = ZipWriter::new(BufWriter::new(sink));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = HashSet::new();

    for path in files {
        let Some(base) = path.file_name().and_then(|name| name.to_str()) else {
            warn!(path = %path.display(), "skipping pack input without a usable name");
            continue;
        };
        let mut source = match File::open(path) {
            Ok(file) if path.is_file() => file,
            Ok(_) => {
                warn!(path = %path.display(), "skipping pack input that is not a file");
                continue;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping missing pack input");
                continue;
            }
        };
        let name = unique_entry_name(&mut names, base);
        zip.start_file(name, options)
            .map_err(|err| WorkAreaError::archive("pack.start_file", output, err))?;
        io::copy(&mut source, &mut zip)
            .map_err(|err| WorkAreaError::archive("pack.copy", output, ZipError::Io(err)))?;
    }

    zip.finish()
        .map_err(|err| WorkAreaError::archive("pack.finish", output, err))?;
    debug!(entries = names.len(), "archive packed");
    Ok(output.to_path_buf())
}

fn resolve_member(root: &Path, relative: &Path) -> WorkAreaResult<Option<PathBuf>> {
    let (Some(parent), Some(file_name)) = (relative.parent(), relative.file_name()) else {
        return Ok(None);
    };
    let parent = root.join(parent);
    fs::create_dir_all(&parent)
        .map_err(|err| WorkAreaError::storage("extract.create_parent", &parent, err))?;
    let parent = parent
        .canonicalize()
        .map_err(|err| WorkAreaError::storage("extract.canonicalize_parent", &parent, err))?;
    if !parent.starts_with(root) {
        return Ok(None);
    }
    let target = parent.join(file_name);
    if fs::symlink_metadata(&target).is_ok_and(|meta| meta.file_type().is_symlink()) {
        return Ok(None);
    }
    Ok(Some(target))
}

fn unique_entry_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };
    let mut counter = 2_u32;
    loop {
        let candidate = extension.map_or_else(
            || format!("{stem} ({counter})"),
            |ext| format!("{stem} ({counter}).{ext}"),
        );
        if names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_test_support::{read_zip, write_zip};
    use std::error::Error;

    type TestResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

    #[test]
    fn extract_skips_traversal_absolute_and_directory_members() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let destination = temp.path().join("area").join("extracted");
        fs::create_dir_all(&destination)?;
        let archive = temp.path().join("upload.zip");
        write_zip(
            &archive,
            &[
                ("../../etc/passwd", b"root:x:0:0"),
                ("/absolute.pdf", b"abs"),
                ("docs/", b""),
                ("docs/a.pdf", b"%PDF-a"),
                ("b.pdf", b"%PDF-b"),
            ],
        )?;

        let extracted = extract(&archive, &destination)?;

        let root = destination.canonicalize()?;
        assert_eq!(
            extracted,
            vec![root.join("docs").join("a.pdf"), root.join("b.pdf")]
        );
        assert!(extracted.iter().all(|path| path.starts_with(&root)));
        assert!(!temp.path().join("etc").exists());
        assert!(!temp.path().join("area").join("etc").exists());
        assert_eq!(fs::read(root.join("docs").join("a.pdf"))?, b"%PDF-a");
        Ok(())
    }

    #[test]
    fn extract_continues_past_members_that_clash() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let destination = temp.path().join("extracted");
        fs::create_dir_all(&destination)?;
        let archive = temp.path().join("upload.zip");
        write_zip(
            &archive,
            &[
                ("a.pdf", b"%PDF-a"),
                ("a.pdf/b.pdf", b"%PDF-b"),
                ("d/e.pdf", b"%PDF-e"),
                ("d", b"file over a directory"),
                ("c.pdf", b"%PDF-c"),
            ],
        )?;

        let extracted = extract(&archive, &destination)?;

        let root = destination.canonicalize()?;
        assert_eq!(
            extracted,
            vec![
                root.join("a.pdf"),
                root.join("d").join("e.pdf"),
                root.join("c.pdf")
            ]
        );
        assert_eq!(fs::read(root.join("a.pdf"))?, b"%PDF-a");
        assert_eq!(fs::read(root.join("c.pdf"))?, b"%PDF-c");
        Ok(())
    }

    #[test]
    fn extract_rejects_non_archives() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let archive = temp.path().join("fake.zip");
        fs::write(&archive, b"definitely not a zip")?;

        let err = extract(&archive, temp.path())
            .err()
            .ok_or("expected archive failure")?;
        assert!(matches!(err, WorkAreaError::Archive { operation: "extract.decode", .. }));
        Ok(())
    }

    #[test]
    fn packing_nothing_yields_a_valid_empty_archive() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let output = temp.path().join("empty.zip");

        assert_eq!(pack(&[], &output)?, output);
        assert!(read_zip(&output)?.is_empty());
        Ok(())
    }

    #[test]
    fn pack_flattens_names_and_skips_missing_inputs() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let nested = temp.path().join("nested");
        fs::create_dir_all(&nested)?;
        let first = nested.join("a.txt");
        let second = temp.path().join("a.txt");
        fs::write(&first, b"first")?;
        fs::write(&second, b"second")?;
        let missing = temp.path().join("gone.txt");
        let output = temp.path().join("out.zip");

        pack(&[first, missing, second], &output)?;

        assert_eq!(
            read_zip(&output)?,
            vec![
                ("a.txt".to_string(), b"first".to_vec()),
                ("a (2).txt".to_string(), b"second".to_vec()),
            ]
        );
        Ok(())
    }

    #[test]
    fn pack_fails_when_destination_cannot_be_created() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let output = temp.path().join("missing-dir").join("out.zip");

        let err = pack(&[], &output).err().ok_or("expected pack failure")?;
        assert!(matches!(err, WorkAreaError::Archive { operation: "pack.create", .. }));
        Ok(())
    }

    #[test]
    fn extract_then_pack_preserves_contents() -> TestResult<()> {
        let temp = tempfile::tempdir()?;
        let originals: Vec<(&str, Vec<u8>)> = vec![
            ("alpha.pdf", b"%PDF-alpha".repeat(100)),
            ("beta.txt", (0..=255_u8).collect()),
        ];
        let entries: Vec<(&str, &[u8])> = originals
            .iter()
            .map(|(name, bytes)| (*name, bytes.as_slice()))
            .collect();
        let archive = temp.path().join("in.zip");
        write_zip(&archive, &entries)?;
        let destination = temp.path().join("extracted");
        fs::create_dir_all(&destination)?;

        let extracted = extract(&archive, &destination)?;
        let repacked = pack(&extracted, &temp.path().join("out.zip"))?;

        let round_tripped = read_zip(&repacked)?;
        let expected: Vec<(String, Vec<u8>)> = originals
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), bytes))
            .collect();
        assert_eq!(round_tripped, expected);
        Ok(())
    }
}
