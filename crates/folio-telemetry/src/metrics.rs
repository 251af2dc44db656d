//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Labels are bounded: routes come from the router's matched paths, operations
//!   and outcomes from fixed vocabularies in the job runner.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    jobs_total: IntCounterVec,
    batch_items_total: IntCounterVec,
    cleanup_failures_total: IntCounter,
    workareas_active: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Work areas allocated and not yet released.
    pub workareas_active: i64,
    /// Cleanup actions that failed since start-up.
    pub cleanup_failures_total: u64,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let jobs_total = counter_vec(
            "jobs_total",
            "Transformation jobs by operation and terminal outcome",
            &["operation", "outcome"],
        )?;
        let batch_items_total = counter_vec(
            "batch_items_total",
            "Batch members processed by operation and outcome",
            &["operation", "outcome"],
        )?;
        let cleanup_failures_total = IntCounter::new(
            "cleanup_failures_total",
            "Cleanup actions that failed",
        )
        .map_err(|source| TelemetryError::Collector {
            metric: "cleanup_failures_total",
            source,
        })?;
        let workareas_active = IntGauge::new(
            "workareas_active",
            "Work areas allocated and not yet released",
        )
        .map_err(|source| TelemetryError::Collector {
            metric: "workareas_active",
            source,
        })?;

        register(&registry, "http_requests_total", http_requests_total.clone())?;
        register(&registry, "jobs_total", jobs_total.clone())?;
        register(&registry, "batch_items_total", batch_items_total.clone())?;
        register(
            &registry,
            "cleanup_failures_total",
            cleanup_failures_total.clone(),
        )?;
        register(&registry, "workareas_active", workareas_active.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                jobs_total,
                batch_items_total,
                cleanup_failures_total,
                workareas_active,
            }),
        })
    }

    /// Increment the HTTP request counter for the supplied route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Record a job reaching a terminal outcome.
    pub fn inc_job(&self, operation: &str, outcome: &str) {
        self.inner
            .jobs_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record one batch member being processed or skipped.
    pub fn inc_batch_item(&self, operation: &str, outcome: &str) {
        self.inner
            .batch_items_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Increment the cleanup failure counter.
    pub fn inc_cleanup_failure(&self) {
        self.inner.cleanup_failures_total.inc();
    }

    /// Note a newly allocated work area.
    pub fn workarea_allocated(&self) {
        self.inner.workareas_active.inc();
    }

    /// Note a released work area.
    pub fn workarea_released(&self) {
        self.inner.workareas_active.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderEncoding { source })
    }

    /// Take a point-in-time snapshot of the gauges reported by health checks.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            workareas_active: self.inner.workareas_active.get(),
            cleanup_failures_total: self.inner.cleanup_failures_total.get(),
        }
    }
}

fn counter_vec(metric: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(metric, help), labels)
        .map_err(|source| TelemetryError::Collector { metric, source })
}

fn register<C>(registry: &Registry, metric: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::Collector { metric, source })
}
