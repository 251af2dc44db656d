//! Job state machine: stage, transform, package, hand off for cleanup.
//!
//! ```text
//! Received -> InputsStaged -> Transformed -> Packaged -> Responding -> (cleaned by guard)
//!     \             \              \
//!      +-------------+--------------+--> Failed -> CleanupAttempted
//! ```

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use folio_telemetry::Metrics;
use folio_workarea::{
    StagedFile, WorkArea, WorkAreaAllocator, WorkAreaError, WorkAreaResult, extract, pack,
};
use futures_util::Stream;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capability::Toolbox;
use crate::cleanup::{CleanupGuard, CleanupScheduler};
use crate::error::{JobError, JobResult};
use crate::kind::InputKind;
use crate::operations::{OutputTarget, Transformation};

const EXTRACTED_DIR: &str = "extracted";
const OUTPUTS_DIR: &str = "outputs";
const WORK_DIR: &str = "work";

/// Observable job states. The final "cleaned" step belongs to the [`CleanupGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created; nothing on disk yet.
    Received,
    /// At least one upload is staged.
    InputsStaged,
    /// The transformation produced its outputs.
    Transformed,
    /// Outputs are packaged into the response file.
    Packaged,
    /// Ownership of the work area moved to the response.
    Responding,
    /// A step failed.
    Failed,
    /// The work area of a failed job was released inline.
    CleanupAttempted,
}

/// How outputs become the response file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packaging {
    /// Respond with the first output.
    Single {
        /// Name presented to the client.
        download_name: String,
    },
    /// Zip every output.
    Archive {
        /// Name presented to the client and used for the archive on disk.
        download_name: String,
    },
}

impl Packaging {
    fn download_name(&self) -> &str {
        match self {
            Self::Single { download_name } | Self::Archive { download_name } => download_name,
        }
    }
}

/// Runs jobs against a shared allocator and toolbox.
#[derive(Debug, Clone)]
pub struct JobRunner {
    allocator: WorkAreaAllocator,
    tools: Toolbox,
    metrics: Metrics,
    scheduler: CleanupScheduler,
}

impl JobRunner {
    /// Assemble a runner.
    #[must_use]
    pub fn new(allocator: WorkAreaAllocator, tools: Toolbox, metrics: Metrics) -> Self {
        let scheduler = CleanupScheduler::new(metrics.clone());
        Self {
            allocator,
            tools,
            metrics,
            scheduler,
        }
    }

    /// Allocator backing every job.
    #[must_use]
    pub const fn allocator(&self) -> &WorkAreaAllocator {
        &self.allocator
    }

    /// Start a job. No storage is touched until the first upload is staged.
    #[must_use]
    pub fn begin(&self, operation: &'static str) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            operation,
            state: JobState::Received,
            allocator: self.allocator.clone(),
            metrics: self.metrics.clone(),
            area: None,
            inputs: Vec::new(),
        };
        debug!(job_id = %job.id, operation, "job received");
        job
    }

    /// Run a single transformation over every staged input.
    ///
    /// # Errors
    ///
    /// Any failure releases the work area before returning.
    pub async fn run(
        &self,
        mut job: Job,
        transformation: &dyn Transformation,
        packaging: Packaging,
    ) -> JobResult<JobOutcome> {
        let Some(area) = job.area.clone() else {
            return Err(job.fail(JobError::invalid_input("No file provided.")));
        };
        let download_name = packaging.download_name().to_string();
        let file = match area.allocate_path(&download_name) {
            Ok(file) => file,
            Err(err) => return Err(job.fail(JobError::from_workarea("allocate_output", err))),
        };
        let target = match area.internal_dir(WORK_DIR).await {
            Ok(scratch) => OutputTarget {
                file,
                parts: area.path().to_path_buf(),
                scratch,
            },
            Err(err) => return Err(job.fail(JobError::from_workarea("scratch_dir", err))),
        };
        let inputs = job.input_paths();

        let outputs = match transformation.apply(&self.tools, &inputs, &target).await {
            Ok(outputs) => outputs,
            Err(err) => {
                let err = JobError::from_transform(job.operation, err, self.allocator.root());
                return Err(job.fail(err));
            }
        };
        job.transition(JobState::Transformed);

        let path = match (&packaging, outputs.first()) {
            (_, None) => {
                return Err(job.fail(JobError::Transformation {
                    operation: job.operation,
                    message: "no output was produced".to_string(),
                    source: None,
                }));
            }
            (Packaging::Single { .. }, Some(first)) => first.clone(),
            (Packaging::Archive { .. }, Some(_)) => {
                match pack_blocking(outputs.clone(), target.file.clone()).await {
                    Ok(path) => path,
                    Err(err) => return Err(job.fail(err)),
                }
            }
        };
        job.transition(JobState::Packaged);
        Ok(self.complete(&mut job, area, path, download_name, outputs, 0))
    }

    /// Apply `transformation` to every archive member of `member_kind` and zip the results.
    ///
    /// Members that fail are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`JobError::InvalidInput`] unless exactly one archive was staged.
    /// - [`JobError::Archive`] when the upload is not a ZIP or holds no member of `member_kind`.
    /// - [`JobError::BatchEmpty`] when every member failed.
    pub async fn run_batch(
        &self,
        mut job: Job,
        transformation: &dyn Transformation,
        member_kind: InputKind,
        download_name: &str,
    ) -> JobResult<JobOutcome> {
        let (Some(area), Some(archive)) = (job.area.clone(), job.input_paths().into_iter().next())
        else {
            return Err(job.fail(JobError::invalid_input("No file provided.")));
        };
        if job.inputs.len() > 1 {
            return Err(job.fail(JobError::invalid_input(
                "Only one ZIP archive may be uploaded.",
            )));
        }

        let extracted = match area.internal_dir(EXTRACTED_DIR).await {
            Ok(dir) => dir,
            Err(err) => return Err(job.fail(JobError::from_workarea("batch.extract_dir", err))),
        };
        let members = {
            let destination = extracted.clone();
            match tokio::task::spawn_blocking(move || extract(&archive, &destination)).await {
                Ok(Ok(members)) => members,
                Ok(Err(err)) => return Err(job.fail(JobError::from_workarea("batch.extract", err))),
                Err(err) => return Err(job.fail(join_failure("batch.extract", &extracted, &err))),
            }
        };
        let candidates: Vec<PathBuf> = members
            .into_iter()
            .filter(|member| member_kind.matches_path(member))
            .collect();
        if candidates.is_empty() {
            return Err(job.fail(JobError::archive(format!(
                "No {} files found in the uploaded ZIP archive.",
                member_kind.noun()
            ))));
        }

        let mut produced = Vec::new();
        let mut skipped = 0_usize;
        for (index, member) in candidates.iter().enumerate() {
            let member_name = member
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("member");
            let target = match batch_target(&area, index, &transformation.batch_output_name(member_name)).await {
                Ok(target) => target,
                Err(err) => return Err(job.fail(err)),
            };
            match transformation
                .apply(&self.tools, std::slice::from_ref(member), &target)
                .await
            {
                Ok(outputs) if !outputs.is_empty() => {
                    self.metrics.inc_batch_item(job.operation, "succeeded");
                    produced.extend(outputs);
                }
                Ok(_) => {
                    skipped += 1;
                    self.metrics.inc_batch_item(job.operation, "failed");
                    warn!(job_id = %job.id, operation = job.operation, member = member_name, "batch member produced no output; skipped");
                }
                Err(err) => {
                    skipped += 1;
                    self.metrics.inc_batch_item(job.operation, "failed");
                    warn!(job_id = %job.id, operation = job.operation, member = member_name, error = %err.cause(), "batch member failed; skipped");
                }
            }
        }
        if produced.is_empty() {
            return Err(job.fail(JobError::BatchEmpty {
                operation: job.operation,
                attempted: candidates.len(),
            }));
        }
        job.transition(JobState::Transformed);

        let output = match area.allocate_path(download_name) {
            Ok(path) => path,
            Err(err) => return Err(job.fail(JobError::from_workarea("allocate_output", err))),
        };
        let path = match pack_blocking(produced.clone(), output).await {
            Ok(path) => path,
            Err(err) => return Err(job.fail(err)),
        };
        job.transition(JobState::Packaged);
        Ok(self.complete(
            &mut job,
            area,
            path,
            download_name.to_string(),
            produced,
            skipped,
        ))
    }

    fn complete(
        &self,
        job: &mut Job,
        area: WorkArea,
        path: PathBuf,
        download_name: String,
        outputs: Vec<PathBuf>,
        skipped: usize,
    ) -> JobOutcome {
        job.area = None;
        job.inputs.clear();
        let mut guard = self.scheduler.guard(job.id, job.operation);
        let released = area.clone();
        let metrics = self.metrics.clone();
        guard.schedule("release_work_area", move || {
            released.release()?;
            metrics.workarea_released();
            Ok(())
        });
        job.transition(JobState::Responding);
        self.metrics.inc_job(job.operation, "succeeded");
        info!(job_id = %job.id, operation = job.operation, area_id = %area.id(), outputs = outputs.len(), skipped, "job succeeded");

        let media_type = mime_guess::from_path(&download_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        JobOutcome {
            job_id: job.id,
            area,
            path,
            download_name,
            media_type,
            outputs,
            skipped,
            guard,
        }
    }
}

async fn batch_target(area: &WorkArea, index: usize, output_name: &str) -> JobResult<OutputTarget> {
    let slot = index.to_string();
    let scratch = area.internal_root().join(WORK_DIR).join(&slot);
    let out_dir = area.internal_root().join(OUTPUTS_DIR).join(&slot);
    for dir in [&scratch, &out_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| storage_failure("batch.item_dir", dir, err))?;
    }
    let name = crate::options::parse_output_name("output_filename", output_name)?;
    Ok(OutputTarget {
        file: out_dir.join(name),
        parts: out_dir,
        scratch,
    })
}

async fn pack_blocking(files: Vec<PathBuf>, output: PathBuf) -> JobResult<PathBuf> {
    let destination = output.clone();
    match tokio::task::spawn_blocking(move || pack(&files, &destination)).await {
        Ok(Ok(path)) => Ok(path),
        Ok(Err(err)) => Err(JobError::Storage {
            operation: "package",
            source: err,
        }),
        Err(err) => Err(join_failure("package", &output, &err)),
    }
}

fn storage_failure(operation: &'static str, path: &Path, source: io::Error) -> JobError {
    JobError::Storage {
        operation,
        source: WorkAreaError::Storage {
            operation,
            path: path.to_path_buf(),
            source,
        },
    }
}

fn join_failure(operation: &'static str, path: &Path, err: &JoinError) -> JobError {
    storage_failure(operation, path, io::Error::other(err.to_string()))
}

/// One request-scoped execution and the work area it owns.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    operation: &'static str,
    state: JobState,
    allocator: WorkAreaAllocator,
    metrics: Metrics,
    area: Option<WorkArea>,
    inputs: Vec<StagedFile>,
}

impl Job {
    /// Job identifier for logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Operation identifier.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Work area, once allocated.
    #[must_use]
    pub const fn area(&self) -> Option<&WorkArea> {
        self.area.as_ref()
    }

    /// Uploads staged so far, in arrival order.
    #[must_use]
    pub fn inputs(&self) -> &[StagedFile] {
        &self.inputs
    }

    /// Check the upload against `kind`, then stream it into the job's work area.
    ///
    /// The work area is allocated by the first successful check.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidInput`] for a mismatched upload and
    /// [`JobError::Storage`] when staging fails. Either way the job has failed and
    /// its work area is gone.
    pub async fn stage<S, E>(
        &mut self,
        stream: S,
        filename: &str,
        content_type: Option<&str>,
        kind: InputKind,
    ) -> JobResult<()>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        if !kind.accepts(filename, content_type) {
            return Err(self.fail(JobError::invalid_input(kind.rejection(filename))));
        }
        let area = match self.ensure_area().await {
            Ok(area) => area,
            Err(err) => return Err(self.fail(err)),
        };
        match area.stage(stream, &kind.staged_name(filename, content_type)).await {
            Ok(staged) => {
                debug!(job_id = %self.id, area_id = %area.id(), bytes = staged.bytes(), "input staged");
                self.inputs.push(staged);
                if self.state == JobState::Received {
                    self.transition(JobState::InputsStaged);
                }
                Ok(())
            }
            Err(err) => Err(self.fail(JobError::from_workarea("stage", err))),
        }
    }

    /// Fail unless at least `minimum` uploads were staged.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidInput`] carrying `message`.
    pub fn require_inputs(&mut self, minimum: usize, message: &str) -> JobResult<()> {
        if self.inputs.len() >= minimum {
            Ok(())
        } else {
            Err(self.fail(JobError::invalid_input(message)))
        }
    }

    /// Record `err` as the job's terminal failure and release its storage inline.
    pub fn fail(&mut self, err: JobError) -> JobError {
        let kind = err.kind();
        if kind.is_client_error() {
            warn!(job_id = %self.id, operation = self.operation, kind = kind.as_str(), error = ?err, "job rejected");
        } else {
            error!(job_id = %self.id, operation = self.operation, kind = kind.as_str(), error = ?err, "job failed");
        }
        self.transition(JobState::Failed);
        self.release_inline();
        self.transition(JobState::CleanupAttempted);
        self.metrics.inc_job(self.operation, kind.as_str());
        err
    }

    async fn ensure_area(&mut self) -> JobResult<WorkArea> {
        if let Some(area) = &self.area {
            return Ok(area.clone());
        }
        let area = self
            .allocator
            .allocate()
            .await
            .map_err(|err| JobError::from_workarea("allocate", err))?;
        self.metrics.workarea_allocated();
        debug!(job_id = %self.id, area_id = %area.id(), "work area allocated");
        self.area = Some(area.clone());
        Ok(area)
    }

    fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|staged| staged.path().to_path_buf())
            .collect()
    }

    fn transition(&mut self, next: JobState) {
        debug!(job_id = %self.id, operation = self.operation, from = ?self.state, to = ?next, "job transition");
        self.state = next;
    }

    /// Release the work area before returning. On a multi-threaded runtime the
    /// worker is handed off first so removal does not stall other tasks.
    fn release_inline(&mut self) {
        self.inputs.clear();
        if let Some(area) = self.area.take() {
            let result = match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| area.release())
                }
                _ => area.release(),
            };
            record_release(self.id, &self.metrics, &area, result);
        }
    }
}

fn record_release(job_id: Uuid, metrics: &Metrics, area: &WorkArea, result: WorkAreaResult<()>) {
    match result {
        Ok(()) => metrics.workarea_released(),
        Err(err) => {
            metrics.inc_cleanup_failure();
            warn!(job_id = %job_id, area_id = %area.id(), error = ?err, "inline work area release failed");
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        let Some(area) = self.area.take() else {
            return;
        };
        warn!(job_id = %self.id, operation = self.operation, state = ?self.state, "job abandoned; releasing work area");
        self.inputs.clear();
        self.metrics.inc_job(self.operation, "abandoned");
        let (job_id, metrics) = (self.id, self.metrics.clone());
        match Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(move || {
                    let result = area.release();
                    record_release(job_id, &metrics, &area, result);
                }));
            }
            Err(_) => {
                let result = area.release();
                record_release(job_id, &metrics, &area, result);
            }
        }
    }
}

/// A successful job waiting to be streamed.
#[derive(Debug)]
pub struct JobOutcome {
    job_id: Uuid,
    area: WorkArea,
    path: PathBuf,
    download_name: String,
    media_type: String,
    outputs: Vec<PathBuf>,
    skipped: usize,
    guard: CleanupGuard,
}

impl JobOutcome {
    /// Job identifier.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Work area holding every artefact.
    #[must_use]
    pub const fn area(&self) -> &WorkArea {
        &self.area
    }

    /// File to send.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name presented to the client.
    #[must_use]
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Media type derived from the download name.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Files produced by the transformation before packaging.
    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Batch members that failed and were left out.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Keep the work area for `retention` after the response finishes.
    pub const fn retain_for(&mut self, retention: Duration) {
        self.guard.retain_for(retention);
    }

    /// Take the cleanup guard; dropping it tears the work area down.
    #[must_use]
    pub fn into_guard(self) -> CleanupGuard {
        self.guard
    }
}
