#![deny(unused)]
//! Vantage - governed, audited proxy for AI APIs
//!
//! Screens every request against the governance policy, forwards it upstream,
//! and records an enriched audit trail off the request path.

use std::sync::Arc;
use std::time::Duration;

use vantage_audit::{audit_channel, AuditWorker, CohereClassifier, WorkerConfig};
use vantage_core::config::{AppConfig, API_KEY_ENV};
use vantage_core::traits::InteractionStore;
use vantage_core::GovernancePolicy;
use vantage_gateway::{GatewayConfig, GatewayServer, HttpUpstream};
use vantage_governance::metrics::UPKEEP_INTERVAL;
use vantage_governance::{GovernanceFilter, MetricsSink};
use vantage_store::SqliteInteractionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing
    vantage_governance::configure_tracing(config.telemetry.json_logs)?;

    tracing::info!("Starting Vantage v{}", env!("CARGO_PKG_VERSION"));

    let api_key = config
        .upstream
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("{} must be set", API_KEY_ENV))?;

    // =========================================================================
    // Governance
    // =========================================================================
    let policy = GovernancePolicy::load_or_default(
        &config.governance.policy_path,
        config.governance.redaction_enabled,
    );
    let filter = Arc::new(GovernanceFilter::new(&policy));

    // =========================================================================
    // Persistence & Metrics
    // =========================================================================
    let store: Arc<dyn InteractionStore> =
        Arc::new(SqliteInteractionStore::open(&config.audit.database_url)?);
    let metrics = Arc::new(MetricsSink::new()?);
    let upkeep = metrics.spawn_upkeep(UPKEEP_INTERVAL);

    // =========================================================================
    // Audit Worker
    // =========================================================================
    let (audit, audit_rx) = audit_channel(config.audit.queue_capacity);
    let classifier = Arc::new(CohereClassifier::new(
        &config.audit.classifier_url,
        api_key.clone(),
        Duration::from_millis(config.audit.classifier_timeout_ms),
    )?);
    let worker = AuditWorker::new(audit_rx, store.clone(), classifier, metrics.clone())
        .with_config(WorkerConfig::from_config(&config.audit, &config.upstream))
        .spawn();

    tracing::info!(
        capacity = config.audit.queue_capacity,
        database = %config.audit.database_url,
        "Audit pipeline initialized"
    );

    // =========================================================================
    // Gateway
    // =========================================================================
    let upstream = Arc::new(HttpUpstream::new(&config.upstream.base_url, api_key)?);
    let server = GatewayServer::new(
        GatewayConfig::from(&config.server),
        store,
        filter,
        audit.clone(),
        upstream,
    )
    .with_metrics(metrics.handle());

    server.run(shutdown_signal()).await?;

    worker.shutdown().await?;
    upkeep.abort();
    tracing::info!(dropped_interactions = audit.dropped(), "Vantage stopped");

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
