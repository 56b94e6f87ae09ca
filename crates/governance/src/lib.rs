#![deny(unused)]
//! Governance for Vantage.
//!
//! This crate provides:
//! - The synchronous governance filter (keyword blocking, PII redaction)
//! - The metrics sink fed by the audit worker
//! - Logging and distributed tracing setup

pub mod filter;
pub mod metrics;
pub mod redaction;
pub mod tracing_layer;

pub use filter::{FilterDecision, GovernanceFilter, PolicyRejection, RejectionPayload};
pub use metrics::MetricsSink;
pub use redaction::{PiiKind, PiiRedactor, Redaction};
pub use tracing_layer::configure_tracing;
