//! Shared application state handed to every handler.

use std::time::Duration;

use folio_jobs::JobRunner;
use folio_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) runner: JobRunner,
    pub(crate) telemetry: Metrics,
    pub(crate) download_retention: Duration,
}

impl ApiState {
    pub(crate) const fn new(
        runner: JobRunner,
        telemetry: Metrics,
        download_retention: Duration,
    ) -> Self {
        Self {
            runner,
            telemetry,
            download_retention,
        }
    }
}
