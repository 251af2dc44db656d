//! Zip builders and readers for archive-shaped test inputs.
//!
//! Entry names are written verbatim so tests can build hostile archives
//! (`../` members, absolute members) that a well-behaved writer would refuse.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::FixtureResult;

/// Write a zip archive containing `entries` to `path`.
///
/// # Errors
///
/// Returns an error when the file cannot be created or an entry cannot be written.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> FixtureResult<()> {
    let file = File::create(path)?;
    write_entries(file, entries)?;
    Ok(())
}

/// Build a zip archive in memory.
///
/// # Errors
///
/// Returns an error when an entry cannot be written.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> FixtureResult<Vec<u8>> {
    let cursor = write_entries(Cursor::new(Vec::new()), entries)?;
    Ok(cursor.into_inner())
}

/// Read every file entry of an archive as `(name, bytes)` pairs in archive order.
///
/// # Errors
///
/// Returns an error when the archive cannot be opened or decoded.
pub fn read_zip(path: &Path) -> FixtureResult<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        entries.push((entry.name().to_string(), contents));
    }
    Ok(entries)
}

fn write_entries<W: Write + Seek>(sink: W, entries: &[(&str, &[u8])]) -> FixtureResult<W> {
    let mut zip = ZipWriter::new(sink);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options)?;
            continue;
        }
        zip.start_file(*name, options)?;
        zip.write_all(contents)?;
    }
    Ok(zip.finish()?)
}
