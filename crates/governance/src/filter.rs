//! Synchronous governance filter: keyword blocking and PII redaction.

use bytes::Bytes;
use serde::Serialize;

use vantage_core::GovernancePolicy;

use crate::redaction::{PiiKind, PiiRedactor};

/// JSON body returned to callers whose request matched a forbidden keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionPayload {
    pub error: &'static str,
    pub code: &'static str,
}

impl RejectionPayload {
    /// The fixed security-violation payload.
    pub const fn security_violation() -> Self {
        Self {
            error: "Security Policy Violation",
            code: "FORBIDDEN_CONTENT",
        }
    }
}

/// Rejection produced by the keyword rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRejection {
    /// The configured keyword that matched.
    pub keyword: String,
    /// Body to send to the caller.
    pub payload: RejectionPayload,
}

impl PolicyRejection {
    /// HTTP status used for policy refusals.
    pub const STATUS: u16 = 403;
}

/// Result of running the filter over one request body.
///
/// Passed by value to the capture stage; the block and redaction signals
/// live here instead of travelling through headers or request extensions.
#[derive(Debug, Clone)]
pub struct FilterDecision {
    /// Whether the request may be forwarded upstream.
    pub forward: bool,
    /// Set when a forbidden keyword matched.
    pub rejection: Option<PolicyRejection>,
    /// Whether redaction rewrote the body.
    pub redacted: bool,
    /// PII kinds removed by redaction.
    pub redacted_kinds: Vec<PiiKind>,
    /// Body every downstream stage must read.
    pub body: Bytes,
}

impl FilterDecision {
    /// Admit a body untouched.
    pub fn admit(body: Bytes) -> Self {
        Self {
            forward: true,
            rejection: None,
            redacted: false,
            redacted_kinds: Vec::new(),
            body,
        }
    }

    fn reject(body: Bytes, keyword: &str) -> Self {
        Self {
            forward: false,
            rejection: Some(PolicyRejection {
                keyword: keyword.to_string(),
                payload: RejectionPayload::security_violation(),
            }),
            redacted: false,
            redacted_kinds: Vec::new(),
            body,
        }
    }

    /// Whether the keyword rule blocked the request.
    pub fn is_blocked(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Applies a [`GovernancePolicy`] to request bodies.
pub struct GovernanceFilter {
    /// (configured keyword, lowercased keyword) in configuration order.
    keywords: Vec<(String, String)>,
    redactor: Option<PiiRedactor>,
}

impl GovernanceFilter {
    /// Build a filter for the given policy.
    pub fn new(policy: &GovernancePolicy) -> Self {
        Self {
            keywords: policy
                .forbidden_keywords
                .iter()
                .map(|k| (k.clone(), k.to_lowercase()))
                .collect(),
            redactor: policy.redaction_enabled.then(PiiRedactor::new),
        }
    }

    /// First configured keyword contained in `text`, ignoring case.
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|(_, needle)| lower.contains(needle.as_str()))
            .map(|(keyword, _)| keyword.as_str())
    }

    /// Decide whether to forward `body`, and what body to forward.
    ///
    /// Keyword blocking runs first; redaction only runs on admitted bodies.
    /// Keywords are matched against a lossy UTF-8 view of the body, while
    /// redaction rewrites the raw bytes so invalid sequences pass through.
    pub fn evaluate(&self, body: Bytes) -> FilterDecision {
        let text = String::from_utf8_lossy(&body);

        if let Some(keyword) = self.matched_keyword(&text) {
            tracing::warn!(keyword = keyword, "Blocked request containing forbidden keyword");
            return FilterDecision::reject(body.clone(), keyword);
        }

        let Some(redactor) = &self.redactor else {
            return FilterDecision::admit(body.clone());
        };

        let redaction = redactor.redact(&body);
        if !redaction.changed() {
            return FilterDecision::admit(body.clone());
        }

        tracing::debug!(kinds = ?redaction.kinds, "Redacted PII from request body");
        FilterDecision {
            forward: true,
            rejection: None,
            redacted: true,
            redacted_kinds: redaction.kinds.clone(),
            body: Bytes::from(redaction.text.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(keywords: &[&str], redaction: bool) -> GovernanceFilter {
        GovernanceFilter::new(&GovernancePolicy::new(keywords.iter().copied(), redaction))
    }

    #[test]
    fn test_keyword_blocks_case_insensitive() {
        let f = filter(&["secret_key"], true);
        let decision = f.evaluate(Bytes::from_static(br#"{"message":"my SECRET_KEY is x"}"#));

        assert!(!decision.forward);
        assert!(decision.is_blocked());
        assert!(!decision.redacted);
        let rejection = decision.rejection.unwrap();
        assert_eq!(rejection.keyword, "secret_key");
        assert_eq!(rejection.payload, RejectionPayload::security_violation());
    }

    #[test]
    fn test_first_keyword_in_order_wins() {
        let f = filter(&["beta", "alpha"], false);
        assert_eq!(f.matched_keyword("alpha and beta"), Some("beta"));
    }

    #[test]
    fn test_block_skips_redaction() {
        let f = filter(&["password"], true);
        let body = Bytes::from_static(b"password for a@b.com");
        let decision = f.evaluate(body.clone());

        assert!(decision.is_blocked());
        assert!(!decision.redacted);
        assert_eq!(decision.body, body);
    }

    #[test]
    fn test_redaction_rewrites_body() {
        let f = filter(&["secret_key"], true);
        let decision = f.evaluate(Bytes::from_static(br#"{"message":"mail a@b.com"}"#));

        assert!(decision.forward);
        assert!(decision.redacted);
        assert_eq!(decision.redacted_kinds, vec![PiiKind::Email]);
        assert_eq!(decision.body, Bytes::from_static(br#"{"message":"mail [REDACTED_EMAIL]"}"#));
    }

    #[test]
    fn test_redaction_disabled_admits_untouched() {
        let f = filter(&[], false);
        let body = Bytes::from_static(b"mail a@b.com");
        let decision = f.evaluate(body.clone());

        assert!(decision.forward);
        assert!(!decision.redacted);
        assert_eq!(decision.body, body);
    }

    #[test]
    fn test_clean_body_is_admitted_unchanged() {
        let f = filter(&["secret_key"], true);
        let body = Bytes::from_static(br#"{"message":"Tell me a joke"}"#);
        let decision = f.evaluate(body.clone());

        assert!(decision.forward);
        assert!(!decision.is_blocked());
        assert!(!decision.redacted);
        assert_eq!(decision.body, body);
    }

    #[test]
    fn test_non_utf8_body_is_not_fatal() {
        let f = filter(&["secret"], true);
        let body = Bytes::from_static(&[0xff, 0xfe, b'o', b'k']);
        let decision = f.evaluate(body.clone());

        assert!(decision.forward);
        assert_eq!(decision.body, body);
    }

    #[test]
    fn test_non_utf8_body_keeps_bytes_when_redacted() {
        let f = filter(&[], true);
        let body = Bytes::from([&[0xff][..], &b" call 555-123-4567"[..]].concat());
        let decision = f.evaluate(body);

        assert!(decision.redacted);
        assert_eq!(
            decision.body,
            Bytes::from([&[0xff][..], &b" call [REDACTED_PHONE]"[..]].concat())
        );
    }

    #[test]
    fn test_rejection_payload_json() {
        let json = serde_json::to_string(&RejectionPayload::security_violation()).unwrap();
        assert_eq!(json, r#"{"error":"Security Policy Violation","code":"FORBIDDEN_CONTENT"}"#);
    }
}
