//! Safety classification traits.

use async_trait::async_trait;

use crate::error::Result;

/// External classifier scoring how safe a user message is.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    /// Return the confidence in `[0, 1]` that `message` is safe.
    async fn classify(&self, message: &str) -> Result<f64>;
}
