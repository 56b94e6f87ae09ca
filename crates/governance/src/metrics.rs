//! Metrics implementation using Prometheus.
//!
//! The sink owns its recorder instead of installing a global one; every
//! update runs under [`metrics::with_local_recorder`]. Handles for rendering
//! the exposition text are cheap to clone and can be given to the HTTP layer.
//! Since no exporter task is installed, [`MetricsSink::spawn_upkeep`] must be
//! running for histogram samples to be folded in between scrapes.

use metrics::with_local_recorder;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;
use tokio::task::JoinHandle;
use vantage_core::{Error, Result};

pub const REQUESTS_TOTAL: &str = "vantage_http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "vantage_http_request_duration_seconds";
pub const TOKEN_USAGE_TOTAL: &str = "vantage_token_usage_total";
pub const SAFETY_UNSCORED_TOTAL: &str = "vantage_safety_unscored_total";

/// Same period the exporter uses when it installs itself globally.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Prometheus default histogram buckets, in seconds.
const DEFAULT_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Process-wide counters and histograms for the audit pipeline.
pub struct MetricsSink {
    recorder: PrometheusRecorder,
}

impl MetricsSink {
    /// Build a sink with its own Prometheus recorder.
    pub fn new() -> Result<Self> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(DEFAULT_BUCKETS)
            .map_err(|e| Error::governance(format!("Failed to configure Prometheus buckets: {}", e)))?
            .build_recorder();

        tracing::info!("Prometheus metrics recorder initialized");
        Ok(Self { recorder })
    }

    /// Handle for rendering the exposition text.
    pub fn handle(&self) -> PrometheusHandle {
        self.recorder.handle()
    }

    /// Render the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.recorder.handle().render()
    }

    /// Periodically run recorder upkeep on the current runtime.
    pub fn spawn_upkeep(&self, period: Duration) -> JoinHandle<()> {
        let handle = self.recorder.handle();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                handle.run_upkeep();
            }
        })
    }

    /// Track one completed request (count and latency).
    pub fn track_request(&self, method: &str, path: &str, status: u16, latency_sec: f64) {
        with_local_recorder(&self.recorder, || {
            metrics::counter!(
                REQUESTS_TOTAL,
                "method" => method.to_string(),
                "path" => path.to_string(),
                "status" => status.to_string()
            )
            .increment(1);

            metrics::histogram!(
                REQUEST_DURATION_SECONDS,
                "method" => method.to_string(),
                "path" => path.to_string()
            )
            .record(latency_sec);
        });
    }

    /// Track tokens consumed from the upstream provider.
    pub fn track_tokens(&self, model: &str, tokens: u64) {
        with_local_recorder(&self.recorder, || {
            metrics::counter!(TOKEN_USAGE_TOTAL, "model" => model.to_string()).increment(tokens);
        });
    }

    /// Track a safety check that fell back to the default score.
    pub fn track_unscored(&self, reason: &'static str) {
        with_local_recorder(&self.recorder, || {
            metrics::counter!(SAFETY_UNSCORED_TOTAL, "reason" => reason).increment(1);
        });
    }
}
