//! Failures while wiring logging and metrics at boot, or rendering `/metrics`.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured log level is not a valid filter directive.
    #[error("invalid log filter")]
    LogFilter {
        /// Directive as configured (`FOLIO_LOG_LEVEL`).
        level: String,
        /// Parser failure.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    Subscriber {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A job or HTTP collector could not be built or registered.
    #[error("failed to set up metric collector")]
    Collector {
        /// Metric name, for example `jobs_total`.
        metric: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be rendered in the text exposition format.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendered exposition text was not UTF-8.
    #[error("rendered metrics were not valid utf-8")]
    RenderEncoding {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tracing_subscriber::EnvFilter;

    #[test]
    fn rejected_log_level_keeps_the_directive() -> std::result::Result<(), Box<dyn Error>> {
        let source = EnvFilter::try_new("folio_jobs=loud")
            .err()
            .ok_or("directive with an unknown level parsed")?;
        let err = TelemetryError::LogFilter {
            level: "folio_jobs=loud".to_string(),
            source,
        };
        assert_eq!(err.to_string(), "invalid log filter");
        assert!(err.source().is_some());
        assert!(matches!(err, TelemetryError::LogFilter { ref level, .. } if level == "folio_jobs=loud"));
        Ok(())
    }

    #[test]
    fn collector_failures_name_the_metric() {
        let err = TelemetryError::Collector {
            metric: "batch_items_total",
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(err.to_string(), "failed to set up metric collector");
        assert!(matches!(err, TelemetryError::Collector { metric: "batch_items_total", .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn render_failures_keep_their_cause() -> std::result::Result<(), Box<dyn Error>> {
        let encoding = String::from_utf8(vec![0xff, 0xfe])
            .err()
            .ok_or("invalid bytes decoded")?;
        let cases = [
            (
                TelemetryError::Render {
                    source: PrometheusError::Msg("workareas_active gauge missing".to_string()),
                },
                "failed to render metrics",
            ),
            (
                TelemetryError::RenderEncoding { source: encoding },
                "rendered metrics were not valid utf-8",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
            assert!(err.source().is_some());
        }
        Ok(())
    }
}
