//! Governance policy: forbidden keywords and the redaction toggle.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// On-disk policy document (`config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFile {
    /// Keywords that cause a request to be rejected, checked in order.
    #[serde(default)]
    pub forbidden_keywords: Vec<String>,
}

impl PolicyFile {
    /// Read and parse a policy document.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read policy file {:?}: {}", path, e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse policy YAML {:?}: {}", path, e)))
    }
}

/// Process-wide governance policy. Read-only after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernancePolicy {
    /// Forbidden keywords in configuration order.
    pub forbidden_keywords: Vec<String>,
    /// Whether PII redaction runs on admitted bodies.
    pub redaction_enabled: bool,
}

impl GovernancePolicy {
    /// Build a policy, discarding blank keywords (they would match every body).
    pub fn new<I, S>(keywords: I, redaction_enabled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forbidden_keywords = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k: &String| {
                let keep = !k.trim().is_empty();
                if !keep {
                    tracing::warn!("Ignoring blank forbidden keyword");
                }
                keep
            })
            .collect();

        Self {
            forbidden_keywords,
            redaction_enabled,
        }
    }

    /// Load the policy file, falling back to an empty keyword list.
    ///
    /// A missing or invalid file leaves keyword blocking disabled rather than
    /// refusing to start.
    pub fn load_or_default(path: impl AsRef<Path>, redaction_enabled: bool) -> Self {
        match PolicyFile::read(path.as_ref()) {
            Ok(file) => {
                let policy = Self::new(file.forbidden_keywords, redaction_enabled);
                tracing::info!(
                    keywords = policy.forbidden_keywords.len(),
                    redaction = redaction_enabled,
                    "Governance policy loaded"
                );
                policy
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load governance policy, using defaults");
                Self::new(Vec::<String>::new(), redaction_enabled)
            }
        }
    }
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            forbidden_keywords: Vec::new(),
            redaction_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_policy_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "forbidden_keywords:\n  - secret_key\n  - DROP TABLE").unwrap();

        let policy = GovernancePolicy::load_or_default(file.path(), true);
        assert_eq!(policy.forbidden_keywords, vec!["secret_key", "DROP TABLE"]);
        assert!(policy.redaction_enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_empty() {
        let policy = GovernancePolicy::load_or_default("/nonexistent/vantage/config.yaml", false);
        assert!(policy.forbidden_keywords.is_empty());
        assert!(!policy.redaction_enabled);
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "forbidden_keywords: [unterminated").unwrap();

        let policy = GovernancePolicy::load_or_default(file.path(), true);
        assert!(policy.forbidden_keywords.is_empty());
    }

    #[test]
    fn test_blank_keywords_are_dropped() {
        let policy = GovernancePolicy::new(vec!["", "  ", "password"], true);
        assert_eq!(policy.forbidden_keywords, vec!["password"]);
    }
}
