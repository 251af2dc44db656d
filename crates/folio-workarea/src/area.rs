//! Work area allocation, upload staging, and release.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures_util::{Stream, StreamExt, pin_mut};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{WorkAreaError, WorkAreaResult};
use crate::paths::{RESERVED_DIR, sanitize_extension, sanitize_filename};

const UPLOADS_DIR: &str = "uploads";

/// Allocates work areas beneath a canonical temp-storage root.
#[derive(Debug, Clone)]
pub struct WorkAreaAllocator {
    root: Arc<Path>,
}

impl WorkAreaAllocator {
    /// Create the root (if needed) and resolve it to its canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`WorkAreaError::Storage`] when the root cannot be created or resolved.
    pub fn new(root: impl AsRef<Path>) -> WorkAreaResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|err| WorkAreaError::storage("allocator.create_root", root, err))?;
        let canonical = root
            .canonicalize()
            .map_err(|err| WorkAreaError::storage("allocator.canonicalize_root", root, err))?;
        Ok(Self {
            root: Arc::from(canonical),
        })
    }

    /// Canonical temp-storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named work area.
    ///
    /// # Errors
    ///
    /// Returns [`WorkAreaError::Storage`] when the directory cannot be created,
    /// including the (vanishingly unlikely) case of an identifier collision.
    pub async fn allocate(&self) -> WorkAreaResult<WorkArea> {
        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());
        fs::create_dir(&path)
            .await
            .map_err(|err| WorkAreaError::storage("allocate.create_dir", &path, err))?;
        debug!(area_id = %id, "work area allocated");
        Ok(WorkArea { id, path })
    }

    /// Resolve a file previously written into a work area.
    ///
    /// `area_id` must be a UUID and `filename` a single plain component. The
    /// resolved path is canonicalised and must stay under the root.
    ///
    /// # Errors
    ///
    /// - [`WorkAreaError::InvalidName`] for malformed identifiers or names.
    /// - [`WorkAreaError::Escape`] when the resolved path leaves the root.
    /// - [`WorkAreaError::Storage`] (not found) when no regular file exists.
    pub fn locate(&self, area_id: &str, filename: &str) -> WorkAreaResult<PathBuf> {
        let id = Uuid::parse_str(area_id)
            .map_err(|_| WorkAreaError::invalid_name("area_id", "not_uuid", area_id))?;
        let mut components = Path::new(filename).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !single || filename.contains('\\') {
            return Err(WorkAreaError::invalid_name(
                "filename",
                "not_single_component",
                filename,
            ));
        }

        let joined = self.root.join(id.to_string()).join(filename);
        let resolved = joined
            .canonicalize()
            .map_err(|err| WorkAreaError::storage("locate.canonicalize", &joined, err))?;
        if !resolved.starts_with(&self.root) {
            return Err(WorkAreaError::Escape { path: resolved });
        }
        if !resolved.is_file() {
            return Err(WorkAreaError::storage(
                "locate.is_file",
                &joined,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        Ok(resolved)
    }

    /// Remove work areas whose last modification is older than `max_age`.
    ///
    /// Only UUID-named directories directly under the root are considered.
    /// Individual failures are logged and skipped. Returns the number removed.
    #[must_use]
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in self.area_dirs() {
            let age = entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "stale work area removal failed");
                }
            }
        }
        removed
    }

    /// Number of work areas currently present on disk.
    #[must_use]
    pub fn active_areas(&self) -> usize {
        self.area_dirs().count()
    }

    fn area_dirs(&self) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(&*self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| Uuid::parse_str(name).is_ok())
            })
    }
}

/// One job's private directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkArea {
    id: Uuid,
    path: PathBuf,
}

impl WorkArea {
    /// Random identifier naming the directory.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Absolute path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory for uploads and intermediate files. Never holds client-named outputs.
    #[must_use]
    pub fn internal_root(&self) -> PathBuf {
        self.path.join(RESERVED_DIR)
    }

    /// Stream an upload to disk chunk by chunk.
    ///
    /// The file lands under [`internal_root`](Self::internal_root) with a random
    /// name; only the sanitised extension of `suggested_name` is kept. A partially
    /// written file is removed on failure.
    ///
    /// # Errors
    ///
    /// - [`WorkAreaError::Upload`] when the stream yields an error.
    /// - [`WorkAreaError::Storage`] when the file cannot be written.
    pub async fn stage<S, E>(&self, stream: S, suggested_name: &str) -> WorkAreaResult<StagedFile>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let extension = sanitize_extension(suggested_name);
        let disk_name = extension.as_ref().map_or_else(
            || Uuid::new_v4().simple().to_string(),
            |ext| format!("{}.{ext}", Uuid::new_v4().simple()),
        );
        let path = self.internal_dir(UPLOADS_DIR).await?.join(disk_name);

        match write_stream(&path, stream, suggested_name).await {
            Ok(bytes) => {
                debug!(area_id = %self.id, bytes, "upload staged");
                Ok(StagedFile {
                    path,
                    original_name: suggested_name.to_string(),
                    extension,
                    bytes,
                })
            }
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&path).await
                    && remove_err.kind() != io::ErrorKind::NotFound
                {
                    warn!(area_id = %self.id, error = %remove_err, "partial upload removal failed");
                }
                Err(err)
            }
        }
    }

    /// Path for a client-named output file at the area root. The file is not created.
    ///
    /// # Errors
    ///
    /// Returns [`WorkAreaError::InvalidName`] when `filename` has no usable base
    /// name or names the reserved directory.
    pub fn allocate_path(&self, filename: &str) -> WorkAreaResult<PathBuf> {
        Ok(self.path.join(sanitize_filename(filename)?))
    }

    /// Create (if needed) a directory for intermediate files under the reserved root.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is unusable or the directory cannot be created.
    pub async fn internal_dir(&self, name: &str) -> WorkAreaResult<PathBuf> {
        let path = self.internal_root().join(sanitize_filename(name)?);
        fs::create_dir_all(&path)
            .await
            .map_err(|err| WorkAreaError::storage("internal_dir.create", &path, err))?;
        Ok(path)
    }

    /// Delete the whole area. Releasing an area that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`WorkAreaError::Storage`] for failures other than "not found".
    pub fn release(&self) -> WorkAreaResult<()> {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!(area_id = %self.id, "work area released");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(WorkAreaError::storage("release.remove_dir_all", &self.path, err)),
        }
    }
}

/// An upload materialised inside a work area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    path: PathBuf,
    original_name: String,
    extension: Option<String>,
    bytes: u64,
}

impl StagedFile {
    /// On-disk location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the client supplied. Never use it as a path.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Client name without directories or extension, for naming derived outputs.
    #[must_use]
    pub fn original_stem(&self) -> String {
        let base = sanitize_filename(&self.original_name).unwrap_or_else(|_| "upload".to_string());
        match base.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => base,
        }
    }

    /// Sanitised lower-case extension.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Number of bytes written.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }
}

async fn write_stream<S, E>(path: &Path, stream: S, suggested_name: &str) -> WorkAreaResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    let file = fs::File::create(path)
        .await
        .map_err(|err| WorkAreaError::storage("stage.create", path, err))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0_u64;
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| WorkAreaError::Upload {
            suggested_name: suggested_name.to_string(),
            source: err.into(),
        })?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|err| WorkAreaError::storage("stage.write", path, err))?;
        written += chunk.len() as u64;
    }
    writer
        .flush()
        .await
        .map_err(|err| WorkAreaError::storage("stage.flush", path, err))?;
    Ok(written)
}
