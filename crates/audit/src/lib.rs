#![deny(unused)]
//! Asynchronous audit pipeline for Vantage.
//!
//! Requests are captured on the hot path and pushed onto a bounded, lossy
//! queue. A single worker drains the queue, counts tokens, scores the user
//! message for safety and persists the enriched record.

pub mod capture;
pub mod safety;
pub mod tokens;
pub mod worker;

pub use capture::{audit_channel, AuditSender, CaptureBody, PendingInteraction, DEFAULT_QUEUE_CAPACITY, USER_ID_HEADER};
pub use safety::{CohereClassifier, DEFAULT_CLASSIFIER_URL};
pub use tokens::{extract_token_count, is_token_bearing};
pub use worker::{AuditWorker, AuditWorkerHandle, SafetyVerdict, WorkerConfig, WorkerState};
