use bytes::Bytes;
use std::io::Write;

use vantage_core::GovernancePolicy;
use vantage_governance::{GovernanceFilter, PiiKind};

fn policy_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_policy_file_drives_filter() {
    let file = policy_file("forbidden_keywords:\n  - secret_key\n  - \"  \"\n  - Project Falcon\n");
    let policy = GovernancePolicy::load_or_default(file.path(), true);
    assert_eq!(policy.forbidden_keywords, vec!["secret_key", "Project Falcon"]);

    let filter = GovernanceFilter::new(&policy);

    let blocked = filter.evaluate(Bytes::from_static(br#"{"message":"status of project falcon?"}"#));
    assert!(blocked.is_blocked());
    assert_eq!(blocked.rejection.unwrap().keyword, "Project Falcon");

    let redacted = filter.evaluate(Bytes::from_static(
        br#"{"message":"call +1 555-123-4567 about 123e4567-e89b-12d3-a456-426614174000"}"#,
    ));
    assert!(redacted.forward);
    assert_eq!(redacted.redacted_kinds, vec![PiiKind::Phone, PiiKind::Uuid]);
    assert_eq!(
        redacted.body,
        Bytes::from_static(br#"{"message":"call [REDACTED_PHONE] about [REDACTED_UUID]"}"#)
    );
}

#[test]
fn test_missing_policy_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let policy = GovernancePolicy::load_or_default(dir.path().join("absent.yaml"), true);
    assert!(policy.forbidden_keywords.is_empty());

    let filter = GovernanceFilter::new(&policy);
    let decision = filter.evaluate(Bytes::from_static(b"secret_key"));
    assert!(decision.forward);
    assert!(!decision.is_blocked());
}

#[test]
fn test_invalid_policy_fails_open() {
    let file = policy_file("forbidden_keywords: [unterminated");
    let policy = GovernancePolicy::load_or_default(file.path(), false);
    assert!(policy.forbidden_keywords.is_empty());
    assert!(!policy.redaction_enabled);
}
