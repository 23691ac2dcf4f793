//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::IcmpBackend;

use super::hosts::{LoadedTargets, load_targets};
use super::validation::ConfigError;

// =============================================================================
// Constants
// =============================================================================

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/opt/healthcheck/config.yml";

/// Default number of probes in flight (1 = sequential).
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default outer bound on a single target (30 seconds).
pub const DEFAULT_TARGET_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-attempt TCP connect timeout (5 seconds).
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default HTTP request timeout (5 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default ICMP echo wait (2 seconds).
pub const DEFAULT_PING_WAIT: Duration = Duration::from_secs(2);

/// Default ping utility.
pub const DEFAULT_PING_PROGRAM: &str = "ping";

/// Default ICAP client.
pub const DEFAULT_ICAP_CLIENT: &str = "c-icap-client";

// =============================================================================
// Probe Settings
// =============================================================================

/// Run-wide probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Probes in flight at once (default: 1).
    pub concurrency: usize,

    /// Outer bound on one target, whatever its protocol (default: 30s).
    #[serde(with = "humantime_serde")]
    pub target_timeout: Duration,

    /// TCP connect timeout per candidate address (default: 5s).
    #[serde(with = "humantime_serde")]
    pub tcp_timeout: Duration,

    /// HTTP request timeout (default: 5s).
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,

    /// ICMP echo wait (default: 2s).
    #[serde(with = "humantime_serde")]
    pub ping_wait: Duration,

    /// ICMP backend (default: command).
    pub icmp_backend: IcmpBackend,

    /// Ping utility used by the command backend (default: "ping").
    pub ping_program: String,

    /// ICAP client executable (default: "c-icap-client").
    pub icap_client: String,

    /// Verify TLS certificates on HTTP probes (default: false).
    pub verify_tls: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            target_timeout: DEFAULT_TARGET_TIMEOUT,
            tcp_timeout: DEFAULT_TCP_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            ping_wait: DEFAULT_PING_WAIT,
            icmp_backend: IcmpBackend::default(),
            ping_program: DEFAULT_PING_PROGRAM.to_string(),
            icap_client: DEFAULT_ICAP_CLIENT.to_string(),
            verify_tls: false,
        }
    }
}

impl ProbeSettings {
    /// Validate settings values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "settings.concurrency must be positive".to_string(),
            ));
        }

        for (field, value) in [
            ("target_timeout", self.target_timeout),
            ("tcp_timeout", self.tcp_timeout),
            ("http_timeout", self.http_timeout),
            ("ping_wait", self.ping_wait),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "settings.{field} must be non-zero"
                )));
            }
        }

        if self.ping_program.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "settings.ping_program cannot be empty".to_string(),
            ));
        }

        if self.icap_client.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "settings.icap_client cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Probe settings.
    #[serde(default)]
    pub settings: ProbeSettings,

    /// Endpoints to probe, in report order.
    ///
    /// Kept as raw YAML; each item is decoded by [`AppConfig::targets`] so a
    /// malformed entry is skipped instead of failing the load.
    #[serde(default)]
    pub hosts: Vec<serde_yaml::Value>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    /// Individual host entries never fail the load; see [`AppConfig::targets`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError` if the text cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any setting is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()
    }

    /// Convert host entries into runnable targets, setting omissions aside.
    pub fn targets(&self) -> LoadedTargets {
        load_targets(&self.hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults() {
        let settings = ProbeSettings::default();
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.target_timeout, Duration::from_secs(30));
        assert_eq!(settings.tcp_timeout, Duration::from_secs(5));
        assert_eq!(settings.http_timeout, Duration::from_secs(5));
        assert_eq!(settings.ping_wait, Duration::from_secs(2));
        assert_eq!(settings.icmp_backend, IcmpBackend::Command);
        assert_eq!(settings.icap_client, "c-icap-client");
        assert!(!settings.verify_tls);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_hosts_only_config() {
        let yaml = r#"
hosts:
  - address: 10.0.0.1
    prot: icmp
  - address: db.internal
    prot: tcp
    tcpport: 5432
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.settings, ProbeSettings::default());
        assert_eq!(config.hosts.len(), 2);

        let loaded = config.targets();
        assert_eq!(loaded.targets.len(), 2);
        assert!(loaded.omitted.is_empty());
    }

    #[test]
    fn test_mistyped_host_field_is_not_fatal() {
        let yaml = r#"
hosts:
  - address: 10.0.0.1
    prot: icmp
  - address: db.internal
    prot: tcp
    tcpport: postgres
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        let loaded = config.targets();
        assert_eq!(loaded.targets.len(), 1);
        assert_eq!(loaded.targets[0].address, "10.0.0.1");
        assert_eq!(loaded.omitted.len(), 1);
        assert_eq!(loaded.omitted[0].index, 1);
        assert!(loaded.omitted[0].reason.contains("postgres"));
    }

    #[test]
    fn test_settings_serde() {
        let yaml = r#"
settings:
  concurrency: 8
  target_timeout: 1m
  tcp_timeout: 750ms
  icmp_backend: socket
  verify_tls: true
hosts: []
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.concurrency, 8);
        assert_eq!(config.settings.target_timeout, Duration::from_secs(60));
        assert_eq!(config.settings.tcp_timeout, Duration::from_millis(750));
        assert_eq!(config.settings.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(config.settings.icmp_backend, IcmpBackend::Socket);
        assert!(config.settings.verify_tls);
    }

    #[test]
    fn test_empty_document_has_no_targets() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert!(config.hosts.is_empty());
        assert!(config.targets().targets.is_empty());
    }

    #[test]
    fn test_zero_concurrency_is_fatal() {
        let yaml = "settings:\n  concurrency: 0\nhosts: []\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_zero_timeout_is_fatal() {
        let yaml = "settings:\n  http_timeout: 0s\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("http_timeout"));
    }

    #[test]
    fn test_malformed_yaml_is_fatal() {
        let err = AppConfig::from_yaml("hosts: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "hosts:\n  - address: https://app.internal/health\n    prot: httpstatus\n    httpstatus: 200\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.targets().targets.len(), 1);
    }
}
