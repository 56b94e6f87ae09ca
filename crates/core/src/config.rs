use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "COHERE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub governance: GovernanceConfig,
    pub audit: AuditConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Label attached to token usage metrics.
    pub provider: String,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GovernanceConfig {
    pub policy_path: String,
    pub redaction_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuditConfig {
    pub database_url: String,
    pub queue_capacity: usize,
    /// Path fragments identifying token-bearing endpoints.
    pub token_paths: Vec<String>,
    pub classifier_url: String,
    pub classifier_timeout_ms: u64,
    /// How long the worker keeps draining queued events after shutdown. Zero disables draining.
    pub drain_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    pub json_logs: bool,
}

impl AppConfig {
    /// Load from `config/vantage.*` (optional) and `VANTAGE__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/vantage").required(false))
            // Map VANTAGE__SERVER__PORT=9090 to server.port
            .add_source(Environment::with_prefix("VANTAGE").separator("__"))
            .build()?;

        let mut cfg: Self = s.try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                cfg.audit.database_url = url;
            }
        }
        cfg.upstream.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .map(Secret::new);

        Ok(cfg)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            allowed_origins: vec!["http://localhost:3000".into()],
            body_limit_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cohere.com".into(),
            provider: "cohere".into(),
            api_key: None,
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            policy_path: "config.yaml".into(),
            redaction_enabled: true,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_url: "./audit.db".into(),
            queue_capacity: 100,
            token_paths: vec!["/chat".into()],
            classifier_url: "https://api.cohere.com/v1/classify".into(),
            classifier_timeout_ms: 10_000,
            drain_timeout_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.audit.queue_capacity, 100);
        assert_eq!(cfg.audit.token_paths, vec!["/chat".to_string()]);
        assert_eq!(cfg.audit.drain_timeout_ms, 0);
        assert!(cfg.governance.redaction_enabled);
        assert!(cfg.upstream.api_key.is_none());
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let cfg: AppConfig = Config::builder()
            .set_override("server.port", 9090)
            .unwrap()
            .set_override("audit.queue_capacity", 5)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.audit.queue_capacity, 5);
        assert_eq!(cfg.audit.database_url, "./audit.db");
    }
}
