//! Token accounting from upstream chat responses.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    meta: Option<ResponseMeta>,
}

#[derive(Debug, Deserialize)]
struct ResponseMeta {
    billed_units: Option<TokenUsage>,
    tokens: Option<TokenUsage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenUsage {
    input_tokens: f64,
    output_tokens: f64,
}

impl TokenUsage {
    fn total(&self) -> u64 {
        whole_tokens(self.input_tokens) + whole_tokens(self.output_tokens)
    }
}

fn whole_tokens(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 {
        n as u64
    } else {
        0
    }
}

/// Whether `path` belongs to an endpoint whose responses report token usage.
pub fn is_token_bearing(path: &str, token_paths: &[String]) -> bool {
    token_paths
        .iter()
        .any(|segment| !segment.is_empty() && path.contains(segment.as_str()))
}

/// Sum of input and output tokens reported by a response body.
///
/// `meta.billed_units` is preferred over `meta.tokens`; only one of them is
/// counted. Anything unparseable counts as zero.
pub fn extract_token_count(body: &[u8]) -> u64 {
    let response: ChatResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "Response body is not a chat response");
            return 0;
        }
    };

    let Some(meta) = response.meta else {
        return 0;
    };

    meta.billed_units
        .or(meta.tokens)
        .map(|usage| usage.total())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billed_units() {
        let body = br#"{"meta":{"billed_units":{"input_tokens":10,"output_tokens":5}}}"#;
        assert_eq!(extract_token_count(body), 15);
    }

    #[test]
    fn test_tokens_fallback() {
        let body = br#"{"text":"hi","meta":{"tokens":{"input_tokens":7,"output_tokens":3}}}"#;
        assert_eq!(extract_token_count(body), 10);
    }

    #[test]
    fn test_billed_units_wins_without_double_count() {
        let body = br#"{"meta":{
            "billed_units":{"input_tokens":10,"output_tokens":5},
            "tokens":{"input_tokens":100,"output_tokens":50}
        }}"#;
        assert_eq!(extract_token_count(body), 15);
    }

    #[test]
    fn test_partial_and_fractional_counts() {
        assert_eq!(extract_token_count(br#"{"meta":{"billed_units":{"output_tokens":4.0}}}"#), 4);
        assert_eq!(extract_token_count(br#"{"meta":{"billed_units":{"input_tokens":2.9}}}"#), 2);
    }

    #[test]
    fn test_unparseable_is_zero() {
        assert_eq!(extract_token_count(b"not json"), 0);
        assert_eq!(extract_token_count(b""), 0);
        assert_eq!(extract_token_count(br#"{"meta":{}}"#), 0);
        assert_eq!(extract_token_count(br#"{"text":"no meta"}"#), 0);
        assert_eq!(extract_token_count(br#"{"meta":{"billed_units":{"input_tokens":"ten"}}}"#), 0);
    }

    #[test]
    fn test_token_bearing_paths() {
        let paths = vec!["/chat".to_string()];
        assert!(is_token_bearing("/v1/chat", &paths));
        assert!(is_token_bearing("/v2/chat/stream", &paths));
        assert!(!is_token_bearing("/v1/embed", &paths));
        assert!(!is_token_bearing("/v1/chat", &[String::new()]));
    }
}
