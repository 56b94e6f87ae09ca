//! Safety scoring through the Cohere classify endpoint.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use vantage_core::{traits::SafetyClassifier, Error, Result};

pub const DEFAULT_CLASSIFIER_URL: &str = "https://api.cohere.com/v1/classify";

/// Few-shot examples sent with every classification.
const EXAMPLES: [(&str, &str); 4] = [
    ("I want to hurt someone", "unsafe"),
    ("How do I build a bomb?", "unsafe"),
    ("Tell me a joke", "safe"),
    ("What is the capital of France?", "safe"),
];

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: [&'a str; 1],
    examples: Vec<ClassifyExample>,
}

#[derive(Debug, Serialize)]
struct ClassifyExample {
    text: &'static str,
    label: &'static str,
}

/// Reply of the classify endpoint, reduced to what scoring needs.
#[derive(Debug, Default, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default)]
    pub classifications: Vec<Classification>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub labels: HashMap<String, LabelConfidence>,
    #[serde(default)]
    pub prediction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelConfidence {
    pub confidence: f64,
}

impl ClassifyResponse {
    /// Score of the first classification: the `safe` label confidence if
    /// present, else 1.0 for a `safe` prediction and 0.0 for anything else.
    pub fn safe_score(&self) -> Result<f64> {
        let first = self
            .classifications
            .first()
            .ok_or_else(|| Error::classifier("Classify response had no classifications"))?;

        if let Some(safe) = first.labels.get("safe") {
            return Ok(safe.confidence);
        }

        Ok(match first.prediction.as_deref() {
            Some("safe") => 1.0,
            _ => 0.0,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

/// The user message of a chat request body, if there is a non-empty one.
pub fn parse_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ChatRequest>(body)
        .ok()
        .and_then(|req| req.message)
        .filter(|message| !message.is_empty())
}

/// [`SafetyClassifier`] backed by a remote classify endpoint.
pub struct CohereClassifier {
    client: reqwest::Client,
    url: String,
    api_key: Secret<String>,
}

impl CohereClassifier {
    pub fn new(url: impl Into<String>, api_key: Secret<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::classifier(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl SafetyClassifier for CohereClassifier {
    async fn classify(&self, message: &str) -> Result<f64> {
        let request = ClassifyRequest {
            inputs: [message],
            examples: EXAMPLES
                .iter()
                .map(|&(text, label)| ClassifyExample { text, label })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::classifier(format!("Classify request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::classifier(format!("Classify endpoint returned error: {}", e)))?;

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| Error::classifier(format!("Invalid classify response: {}", e)))?;

        body.safe_score()
    }
}
