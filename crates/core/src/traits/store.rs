//! Persistence traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InteractionRecord, NewInteractionRecord};

/// Number of records returned by [`InteractionStore::list`] when no limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Append-only log of enriched interactions.
///
/// Only the audit worker appends; every other component is a reader.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Insert one record, returning its assigned identifier.
    async fn append(&self, record: NewInteractionRecord) -> Result<i64>;

    /// Return up to `limit` records, most recent first. A zero limit means
    /// [`DEFAULT_LIST_LIMIT`].
    async fn list(&self, limit: usize) -> Result<Vec<InteractionRecord>>;
}

/// Map a requested limit to the effective one.
pub fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit
    }
}
