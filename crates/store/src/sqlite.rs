//! SQLite-backed interaction log.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;

use vantage_core::{
    traits::{effective_limit, InteractionStore},
    types::{InteractionRecord, NewInteractionRecord},
    Error, Result,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS interaction_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user_id TEXT NOT NULL,
    method TEXT NOT NULL,
    path TEXT NOT NULL,
    request_body BLOB,
    response_body BLOB,
    status_code INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    token_count INTEGER NOT NULL DEFAULT 0,
    safety_score REAL NOT NULL DEFAULT 1.0,
    is_blocked BOOLEAN NOT NULL DEFAULT 0,
    is_redacted BOOLEAN NOT NULL DEFAULT 0
)";

/// Fixed-width UTC timestamps so that text order is time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let timestamp: String = row.get(1)?;
    let request_body: Option<Vec<u8>> = row.get(5)?;
    let response_body: Option<Vec<u8>> = row.get(6)?;
    let status_code: i64 = row.get(7)?;

    Ok(InteractionRecord {
        id: row.get(0)?,
        timestamp: parse_timestamp(1, &timestamp)?,
        user_id: row.get(2)?,
        method: row.get(3)?,
        path: row.get(4)?,
        request_body: String::from_utf8_lossy(&request_body.unwrap_or_default()).into_owned(),
        response_body: String::from_utf8_lossy(&response_body.unwrap_or_default()).into_owned(),
        status_code: u16::try_from(status_code).unwrap_or_default(),
        latency_ms: row.get(8)?,
        token_count: row.get(9)?,
        safety_score: row.get(10)?,
        is_blocked: row.get(11)?,
        is_redacted: row.get(12)?,
    })
}

/// Interaction log stored in a single SQLite file.
///
/// The connection sits behind a mutex and all statements run on the blocking
/// pool. Writes are expected from the audit worker only.
pub struct SqliteInteractionStore {
    conn: Arc<tokio::sync::Mutex<Connection>>,
}

impl SqliteInteractionStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::storage(format!("Failed to open sqlite: {}", e)))?;
        tracing::info!(path = %path.as_ref().display(), "Opened interaction log");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open sqlite: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .map_err(|e| Error::storage(format!("Schema error: {}", e)))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_interaction_logs_timestamp ON interaction_logs (timestamp)",
            [],
        )
        .map_err(|e| Error::storage(format!("Index error: {}", e)))?;

        Ok(Self {
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl InteractionStore for SqliteInteractionStore {
    async fn append(&self, record: NewInteractionRecord) -> Result<i64> {
        let conn = self.conn.clone();
        let timestamp = format_timestamp(record.timestamp.unwrap_or_else(Utc::now));

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO interaction_logs (timestamp, user_id, method, path, request_body, response_body,
                    status_code, latency_ms, token_count, safety_score, is_blocked, is_redacted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    timestamp,
                    record.user_id,
                    record.method,
                    record.path,
                    record.request_body.as_ref(),
                    record.response_body.as_ref(),
                    record.status_code,
                    record.latency_ms,
                    record.token_count,
                    record.safety_score,
                    record.is_blocked,
                    record.is_redacted
                ],
            )
            .map_err(|e| Error::storage(format!("Insert error: {}", e)))?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }

    async fn list(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn.clone();
        let limit = i64::try_from(effective_limit(limit)).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, user_id, method, path, request_body, response_body,
                        status_code, latency_ms, token_count, safety_score, is_blocked, is_redacted
                     FROM interaction_logs
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?1",
                )
                .map_err(|e| Error::storage(format!("Prepare error: {}", e)))?;

            let records = stmt
                .query_map(params![limit], record_from_row)
                .map_err(|e| Error::storage(format!("Query error: {}", e)))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::storage(format!("Row error: {}", e)))?;

            Ok(records)
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }
}
