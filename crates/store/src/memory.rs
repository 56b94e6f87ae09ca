//! In-memory interaction log, used in tests and when no database is wanted.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use vantage_core::{
    traits::{effective_limit, InteractionStore},
    types::{InteractionRecord, NewInteractionRecord},
    Result,
};

/// Interaction log held in a vector; same ordering rules as the SQLite store.
#[derive(Default)]
pub struct InMemoryInteractionStore {
    records: RwLock<Vec<InteractionRecord>>,
    next_id: AtomicI64,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InteractionStore for InMemoryInteractionStore {
    async fn append(&self, record: NewInteractionRecord) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = InteractionRecord {
            id,
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            user_id: record.user_id,
            method: record.method,
            path: record.path,
            request_body: String::from_utf8_lossy(&record.request_body).into_owned(),
            response_body: String::from_utf8_lossy(&record.response_body).into_owned(),
            status_code: record.status_code,
            latency_ms: record.latency_ms,
            token_count: record.token_count,
            safety_score: record.safety_score,
            is_blocked: record.is_blocked,
            is_redacted: record.is_redacted,
        };

        self.records.write().await.push(stored);
        Ok(id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<InteractionRecord>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        records.truncate(effective_limit(limit));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{DateTime, Duration};

    fn record(user: &str, timestamp: Option<DateTime<Utc>>) -> NewInteractionRecord {
        NewInteractionRecord {
            timestamp,
            user_id: user.to_string(),
            method: "POST".to_string(),
            path: "/v1/chat".to_string(),
            request_body: Bytes::new(),
            response_body: Bytes::new(),
            status_code: 403,
            latency_ms: 1,
            token_count: 0,
            safety_score: 1.0,
            is_blocked: true,
            is_redacted: false,
        }
    }

    #[tokio::test]
    async fn test_newest_first_with_id_tiebreak() {
        let store = InMemoryInteractionStore::new();
        let ts = Utc::now();
        store.append(record("first", Some(ts))).await.unwrap();
        store.append(record("second", Some(ts))).await.unwrap();
        store.append(record("old", Some(ts - Duration::minutes(1)))).await.unwrap();

        let users: Vec<String> = store.list(10).await.unwrap().into_iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec!["second", "first", "old"]);
    }

    #[tokio::test]
    async fn test_default_limit() {
        let store = InMemoryInteractionStore::new();
        for _ in 0..60 {
            store.append(record("u", None)).await.unwrap();
        }
        assert_eq!(store.len().await, 60);
        assert_eq!(store.list(0).await.unwrap().len(), 50);
        assert_eq!(store.list(7).await.unwrap().len(), 7);
    }
}
