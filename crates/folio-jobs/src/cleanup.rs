//! Deferred teardown of job artefacts.
//!
//! # Design
//! - A [`CleanupGuard`] travels with a response. Its actions run once, when the
//!   guard is dropped, which happens after the transport has finished with the
//!   body (or abandoned it).
//! - With a Tokio runtime available the actions run on the blocking pool, after an
//!   optional retention delay. Without one they run inline.
//! - Actions are independent: each failure is logged and counted, and the
//!   remaining actions still run.

use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::time::Duration;

use folio_telemetry::Metrics;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

type CleanupResult = Result<(), Box<dyn StdError + Send + Sync>>;
type CleanupAction = Box<dyn FnOnce() -> CleanupResult + Send>;

struct CleanupTask {
    label: &'static str,
    action: CleanupAction,
}

/// Hands out [`CleanupGuard`]s that share the service metrics.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    metrics: Metrics,
}

impl CleanupScheduler {
    /// Create a scheduler that reports failures through `metrics`.
    #[must_use]
    pub const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    /// Start an empty guard for one job.
    #[must_use]
    pub fn guard(&self, job_id: Uuid, operation: &'static str) -> CleanupGuard {
        CleanupGuard {
            job_id,
            operation,
            tasks: Vec::new(),
            delay: None,
            metrics: self.metrics.clone(),
        }
    }
}

/// Cleanup actions owed by one job, run when the guard is dropped.
pub struct CleanupGuard {
    job_id: Uuid,
    operation: &'static str,
    tasks: Vec<CleanupTask>,
    delay: Option<Duration>,
    metrics: Metrics,
}

impl fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("job_id", &self.job_id)
            .field("operation", &self.operation)
            .field("pending", &self.tasks.len())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl CleanupGuard {
    /// Register an action. Actions must be idempotent and must not depend on each other.
    pub fn schedule<F>(&mut self, label: &'static str, action: F)
    where
        F: FnOnce() -> CleanupResult + Send + 'static,
    {
        self.tasks.push(CleanupTask {
            label,
            action: Box::new(action),
        });
    }

    /// Keep the artefacts for `delay` after the guard is dropped.
    pub const fn retain_for(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    /// Number of registered actions not yet run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Run every action on the current thread, ignoring any retention delay.
    pub fn run_now(mut self) {
        let tasks = mem::take(&mut self.tasks);
        run_tasks(self.job_id, self.operation, &self.metrics, tasks);
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let tasks = mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        let (job_id, operation, delay) = (self.job_id, self.operation, self.delay);
        let metrics = self.metrics.clone();
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let worker = tokio::task::spawn_blocking(move || {
                    run_tasks(job_id, operation, &metrics, tasks);
                });
                if let Err(err) = worker.await {
                    warn!(%job_id, operation, error = %err, "cleanup worker failed");
                }
            });
        } else {
            run_tasks(job_id, operation, &metrics, tasks);
        }
    }
}

fn run_tasks(job_id: Uuid, operation: &'static str, metrics: &Metrics, tasks: Vec<CleanupTask>) {
    let total = tasks.len();
    let mut failed = 0_usize;
    for task in tasks {
        if let Err(err) = (task.action)() {
            failed += 1;
            metrics.inc_cleanup_failure();
            warn!(%job_id, operation, task = task.label, error = %err, "cleanup action failed");
        }
    }
    debug!(%job_id, operation, total, failed, "job cleaned");
}
