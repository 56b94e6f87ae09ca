//! PII redaction for request bodies.
//!
//! Patterns run in a fixed order (email, phone, UUID) and each replaces every
//! non-overlapping match with a marker. Markers contain no characters any
//! pattern can match, so running the redactor twice changes nothing.
//! Patterns run over raw bytes: invalid UTF-8 outside a match is preserved.

use regex::bytes::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Category of personal data a pattern detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Phone,
    Uuid,
}

impl PiiKind {
    /// Replacement written in place of each match.
    pub fn marker(self) -> &'static str {
        match self {
            PiiKind::Email => "[REDACTED_EMAIL]",
            PiiKind::Phone => "[REDACTED_PHONE]",
            PiiKind::Uuid => "[REDACTED_UUID]",
        }
    }
}

/// Outcome of a redaction pass.
#[derive(Debug, Clone)]
pub struct Redaction<'a> {
    /// Body after all replacements.
    pub text: Cow<'a, [u8]>,
    /// Kinds that matched at least once, in pattern order.
    pub kinds: Vec<PiiKind>,
}

impl Redaction<'_> {
    /// Whether any pattern rewrote the text.
    pub fn changed(&self) -> bool {
        !self.kinds.is_empty()
    }
}

/// Regex-based PII redactor.
pub struct PiiRedactor {
    patterns: Vec<(PiiKind, Regex)>,
}

impl PiiRedactor {
    /// Create a redactor with the email, phone and UUID patterns.
    pub fn new() -> Self {
        let patterns = vec![
            (PiiKind::Email, Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email pattern")),
            (PiiKind::Phone, Regex::new(r"(?:\+\d{1,2}\s?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b").expect("valid phone pattern")),
            (PiiKind::Uuid, Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").expect("valid uuid pattern")),
        ];
        Self { patterns }
    }

    /// Kinds of PII present in `text`, without modifying it.
    pub fn scan(&self, text: &[u8]) -> Vec<PiiKind> {
        self.patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Replace every match of every pattern with its marker.
    pub fn redact<'a>(&self, text: &'a [u8]) -> Redaction<'a> {
        let mut current: Cow<'a, [u8]> = Cow::Borrowed(text);
        let mut kinds = Vec::new();

        for (kind, regex) in &self.patterns {
            let replaced = match regex.replace_all(&current, NoExpand(kind.marker().as_bytes())) {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(s) = replaced {
                kinds.push(*kind);
                current = Cow::Owned(s);
            }
        }

        Redaction { text: current, kinds }
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redact(text: &str) -> (String, Vec<PiiKind>) {
        let out = PiiRedactor::new().redact(text.as_bytes());
        (String::from_utf8(out.text.into_owned()).unwrap(), out.kinds)
    }

    #[test]
    fn test_redact_email() {
        let (text, kinds) = redact("Contact me at john.doe@example.com or jane@corp.io");
        assert_eq!(text, "Contact me at [REDACTED_EMAIL] or [REDACTED_EMAIL]");
        assert_eq!(kinds, vec![PiiKind::Email]);
    }

    #[test]
    fn test_redact_phone_formats() {
        for phone in ["555-123-4567", "(555) 123-4567", "+1 555.123.4567", "5551234567"] {
            let (text, _) = redact(&format!("call {} now", phone));
            assert_eq!(text, "call [REDACTED_PHONE] now", "phone {}", phone);
        }
    }

    #[test]
    fn test_redact_uuid() {
        let (text, kinds) = redact("session 550e8400-e29b-41d4-a716-446655440000 expired");
        assert_eq!(text, "session [REDACTED_UUID] expired");
        assert_eq!(kinds, vec![PiiKind::Uuid]);
    }

    #[test]
    fn test_all_kinds_in_order() {
        let (text, kinds) = redact(r#"{"message":"a@b.com 555-123-4567 123e4567-e89b-12d3-a456-426614174abc"}"#);
        assert_eq!(kinds, vec![PiiKind::Email, PiiKind::Phone, PiiKind::Uuid]);
        assert!(!text.contains("a@b.com"));
        assert!(!text.contains("555-123-4567"));
        assert!(!text.contains("123e4567-e89b-12d3-a456-426614174abc"));
    }

    #[test]
    fn test_clean_text_is_borrowed() {
        let out = PiiRedactor::new().redact(b"Hello, how are you?");
        assert!(!out.changed());
        assert!(matches!(out.text, Cow::Borrowed(_)));
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let (once, _) = redact("mail a@b.com, phone 555-123-4567");
        let twice = PiiRedactor::new().redact(once.as_bytes());
        assert!(!twice.changed());
        assert_eq!(twice.text.as_ref(), once.as_bytes());
    }

    #[test]
    fn test_invalid_utf8_survives_redaction() {
        let body = [&[0xff, 0xfe][..], &b" mail a@b.com "[..], &[0xc3][..]].concat();
        let out = PiiRedactor::new().redact(&body);

        assert_eq!(out.kinds, vec![PiiKind::Email]);
        let expected = [&[0xff, 0xfe][..], &b" mail [REDACTED_EMAIL] "[..], &[0xc3][..]].concat();
        assert_eq!(out.text.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_scan() {
        let redactor = PiiRedactor::new();
        assert_eq!(redactor.scan(b"john@example.com"), vec![PiiKind::Email]);
        assert!(redactor.scan(b"nothing here").is_empty());
    }
}
