//! The single background consumer of the audit queue.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use vantage_core::{
    config::{AuditConfig, UpstreamConfig},
    traits::{InteractionStore, SafetyClassifier},
    Error, Interaction, NewInteractionRecord, Result,
};
use vantage_governance::MetricsSink;

use crate::safety::parse_message;
use crate::tokens::{extract_token_count, is_token_bearing};

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path fragments of endpoints whose responses carry token usage.
    pub token_paths: Vec<String>,
    /// Label for the token usage metric.
    pub provider: String,
    /// Time allowed to empty the queue after shutdown. Zero means queued
    /// interactions are abandoned.
    pub drain_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            token_paths: vec!["/chat".to_string()],
            provider: "cohere".to_string(),
            drain_timeout: Duration::ZERO,
        }
    }
}

impl WorkerConfig {
    pub fn from_config(audit: &AuditConfig, upstream: &UpstreamConfig) -> Self {
        Self {
            token_paths: audit.token_paths.clone(),
            provider: upstream.provider.clone(),
            drain_timeout: Duration::from_millis(audit.drain_timeout_ms),
        }
    }
}

/// Lifecycle of the worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Draining,
    Stopped,
}

/// Outcome of the safety check for one interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyVerdict {
    /// The classifier answered.
    Scored(f64),
    /// No score could be obtained; the reason is used as a metric label.
    Unscored(&'static str),
}

impl SafetyVerdict {
    /// Persisted score. Unscored interactions are recorded as safe.
    pub fn score(&self) -> f64 {
        match self {
            SafetyVerdict::Scored(score) => *score,
            SafetyVerdict::Unscored(_) => 1.0,
        }
    }
}

/// Enriches and persists interactions taken off the audit queue.
pub struct AuditWorker {
    receiver: mpsc::Receiver<Interaction>,
    store: Arc<dyn InteractionStore>,
    classifier: Arc<dyn SafetyClassifier>,
    metrics: Arc<MetricsSink>,
    config: WorkerConfig,
}

impl AuditWorker {
    pub fn new(
        receiver: mpsc::Receiver<Interaction>,
        store: Arc<dyn InteractionStore>,
        classifier: Arc<dyn SafetyClassifier>,
        metrics: Arc<MetricsSink>,
    ) -> Self {
        Self {
            receiver,
            store,
            classifier,
            metrics,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the worker on its own task.
    pub fn spawn(self) -> AuditWorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(WorkerState::Running);
        let task = tokio::spawn(self.run(shutdown_rx, state_tx));

        AuditWorkerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>, state: watch::Sender<WorkerState>) {
        tracing::info!("Audit worker started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    tracing::info!("Audit worker stopping");
                    break;
                }
                next = self.receiver.recv() => match next {
                    Some(interaction) => self.process_guarded(interaction).await,
                    None => {
                        tracing::info!("Audit queue closed");
                        break;
                    }
                },
            }
        }

        if !self.config.drain_timeout.is_zero() {
            state.send_replace(WorkerState::Draining);
            self.drain().await;
        }

        state.send_replace(WorkerState::Stopped);
        tracing::info!("Audit worker stopped");
    }

    /// Process what is already queued, bounded by the drain timeout.
    async fn drain(&mut self) {
        self.receiver.close();
        let timeout = self.config.drain_timeout;

        let drained = tokio::time::timeout(timeout, async {
            let mut count = 0usize;
            while let Some(interaction) = self.receiver.recv().await {
                self.process_guarded(interaction).await;
                count += 1;
            }
            count
        })
        .await;

        match drained {
            Ok(count) => tracing::info!(count, "Audit queue drained"),
            Err(_) => tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Audit drain timed out"),
        }
    }

    async fn process_guarded(&self, interaction: Interaction) {
        let method = interaction.method.clone();
        let path = interaction.path.clone();

        if let Err(panic) = AssertUnwindSafe(self.process(interaction)).catch_unwind().await {
            tracing::error!(
                method = %method,
                path = %path,
                panic = panic_message(panic.as_ref()),
                "Recovered from panic while auditing interaction"
            );
        }
    }

    /// Enrich one interaction and hand it to the store.
    ///
    /// Never fails: enrichment problems degrade to defaults and storage
    /// errors are logged.
    async fn process(&self, interaction: Interaction) {
        self.metrics.track_request(
            &interaction.method,
            &interaction.path,
            interaction.status_code,
            interaction.duration.as_secs_f64(),
        );

        let tokens = self.count_tokens(&interaction);
        let verdict = self.assess_safety(&interaction.request_body).await;
        if let SafetyVerdict::Unscored(reason) = verdict {
            self.metrics.track_unscored(reason);
        }

        let record = NewInteractionRecord::from_interaction(&interaction, tokens, verdict.score());
        let latency_ms = record.latency_ms;

        match self.store.append(record).await {
            Ok(id) => tracing::debug!(
                id,
                method = %interaction.method,
                path = %interaction.path,
                status = interaction.status_code,
                tokens,
                safety_score = verdict.score(),
                latency_ms,
                "Interaction recorded"
            ),
            Err(e) => tracing::error!(
                error = %e,
                method = %interaction.method,
                path = %interaction.path,
                "Failed to persist interaction"
            ),
        }
    }

    fn count_tokens(&self, interaction: &Interaction) -> u64 {
        if !interaction.is_success() || !is_token_bearing(&interaction.path, &self.config.token_paths) {
            tracing::trace!(
                status = interaction.status_code,
                path = %interaction.path,
                "Skipping token accounting"
            );
            return 0;
        }

        let tokens = extract_token_count(&interaction.response_body);
        if tokens == 0 {
            tracing::debug!(path = %interaction.path, "No token usage found in response");
        } else {
            self.metrics.track_tokens(&self.config.provider, tokens);
        }
        tokens
    }

    async fn assess_safety(&self, request_body: &[u8]) -> SafetyVerdict {
        let Some(message) = parse_message(request_body) else {
            return SafetyVerdict::Unscored("no_message");
        };

        match self.classifier.classify(&message).await {
            Ok(score) => SafetyVerdict::Scored(score),
            Err(e) => {
                tracing::warn!(error = %e, "Safety check failed, recording as safe");
                SafetyVerdict::Unscored("classifier_error")
            }
        }
    }
}

/// Resolves once shutdown is requested. If the handle is gone without asking,
/// never resolves and the worker runs until the queue closes.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Control handle for a spawned [`AuditWorker`].
pub struct AuditWorkerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
}

impl AuditWorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Receiver for state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Stop after the current item (draining first if configured) and wait.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.join().await
    }

    /// Wait for the worker to finish on its own, i.e. after every
    /// [`AuditSender`](crate::AuditSender) has been dropped.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::internal(format!("Audit worker task failed: {}", e)))
    }
}
