//! Mock implementations of core traits for testing.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::{
    traits::{InteractionStore, SafetyClassifier},
    types::{InteractionRecord, NewInteractionRecord},
    Error, Result,
};

// =============================================================================
// Mock Safety Classifier
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum ClassifierBehavior {
    Score(f64),
    Fail,
    Panic,
}

/// Scripted classifier that records every message it is asked about.
pub struct MockSafetyClassifier {
    behavior: ClassifierBehavior,
    delay: Option<Duration>,
    messages: Mutex<Vec<String>>,
}

impl MockSafetyClassifier {
    /// Always return `score`.
    pub fn constant(score: f64) -> Self {
        Self::with_behavior(ClassifierBehavior::Score(score))
    }

    /// Always fail as if the endpoint were unreachable.
    pub fn failing() -> Self {
        Self::with_behavior(ClassifierBehavior::Fail)
    }

    /// Panic on every call.
    pub fn panicking() -> Self {
        Self::with_behavior(ClassifierBehavior::Panic)
    }

    fn with_behavior(behavior: ClassifierBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, simulating a slow endpoint.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of classification calls made.
    pub fn call_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Messages received, in call order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SafetyClassifier for MockSafetyClassifier {
    async fn classify(&self, message: &str) -> Result<f64> {
        self.messages.lock().unwrap().push(message.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            ClassifierBehavior::Score(score) => Ok(score),
            ClassifierBehavior::Fail => Err(Error::classifier("mock classifier unavailable")),
            ClassifierBehavior::Panic => panic!("mock classifier panicked"),
        }
    }
}

// =============================================================================
// Failing Store
// =============================================================================

/// Store whose every operation fails with a storage error.
#[derive(Debug, Default)]
pub struct FailingInteractionStore;

#[async_trait]
impl InteractionStore for FailingInteractionStore {
    async fn append(&self, _record: NewInteractionRecord) -> Result<i64> {
        Err(Error::storage("disk I/O error"))
    }

    async fn list(&self, _limit: usize) -> Result<Vec<InteractionRecord>> {
        Err(Error::storage("disk I/O error"))
    }
}
