//! Interaction events and their persisted records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User identifier recorded when the caller supplies no identity header.
pub const ANONYMOUS_USER: &str = "anonymous";

/// A single request/response cycle captured by the proxy.
///
/// Built once per request after the response has been relayed, then moved
/// through the audit queue to the worker. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Interaction {
    /// When the request entered the pipeline.
    pub timestamp: DateTime<Utc>,
    /// Caller identity, or [`ANONYMOUS_USER`].
    pub user_id: String,
    /// HTTP method.
    pub method: String,
    /// Request path (no query string).
    pub path: String,
    /// Request body as forwarded, i.e. after redaction.
    pub request_body: Bytes,
    /// Response body as relayed to the caller.
    pub response_body: Bytes,
    /// Response status code.
    pub status_code: u16,
    /// Time from pipeline entry to end of the response stream.
    pub duration: Duration,
    /// The governance filter rejected the request.
    pub is_blocked: bool,
    /// The governance filter rewrote the request body.
    pub is_redacted: bool,
}

impl Interaction {
    /// Whether the exchange completed with `200 OK`.
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Write-side shape of an [`InteractionRecord`].
///
/// The store assigns the identifier; the timestamp defaults to the time of
/// insertion when absent.
#[derive(Debug, Clone)]
pub struct NewInteractionRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: String,
    pub method: String,
    pub path: String,
    pub request_body: Bytes,
    pub response_body: Bytes,
    pub status_code: u16,
    pub latency_ms: i64,
    pub token_count: i64,
    pub safety_score: f64,
    pub is_blocked: bool,
    pub is_redacted: bool,
}

impl NewInteractionRecord {
    /// Enrich an interaction with its token count and safety score.
    pub fn from_interaction(interaction: &Interaction, token_count: u64, safety_score: f64) -> Self {
        Self {
            timestamp: Some(interaction.timestamp),
            user_id: interaction.user_id.clone(),
            method: interaction.method.clone(),
            path: interaction.path.clone(),
            request_body: interaction.request_body.clone(),
            response_body: interaction.response_body.clone(),
            status_code: interaction.status_code,
            latency_ms: i64::try_from(interaction.duration.as_millis()).unwrap_or(i64::MAX),
            token_count: i64::try_from(token_count).unwrap_or(i64::MAX),
            safety_score: safety_score.clamp(0.0, 1.0),
            is_blocked: interaction.is_blocked,
            is_redacted: interaction.is_redacted,
        }
    }
}

/// A persisted, enriched interaction as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub method: String,
    pub path: String,
    pub request_body: String,
    pub response_body: String,
    pub status_code: u16,
    pub latency_ms: i64,
    #[serde(rename = "tokens")]
    pub token_count: i64,
    pub safety_score: f64,
    pub is_blocked: bool,
    pub is_redacted: bool,
}
