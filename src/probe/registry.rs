//! Strategy selection.

use std::time::Duration;

use reqwest::Client;

use crate::config::{ConfigError, ProbeSettings};
use crate::probe::http::build_client;
use crate::probe::{
    HttpStatusProbe, HttpStringProbe, IcapProbe, IcmpBackend, IcmpProbe, Probe, TcpProbe,
};
use crate::target::Check;

/// Builds the strategy for each [`Check`] from run-wide settings.
///
/// Holds the resources shared across probes of one run, such as the HTTP
/// client and its connection pool.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    settings: ProbeSettings,
    http: Client,
}

impl ProbeRegistry {
    /// Create a registry for `settings`.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if the HTTP client cannot be built.
    pub fn new(settings: ProbeSettings) -> Result<Self, ConfigError> {
        let http = build_client(settings.http_timeout, settings.verify_tls).map_err(|e| {
            ConfigError::ValidationError(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self { settings, http })
    }

    /// Settings this registry was built from.
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// The strategy implementing `check`.
    pub fn strategy(&self, check: &Check) -> Box<dyn Probe> {
        match check {
            Check::Icmp => Box::new(IcmpProbe::new(
                self.settings.icmp_backend,
                self.settings.ping_program.clone(),
            )),
            Check::Tcp { port } => Box::new(TcpProbe::new(*port)),
            Check::HttpStatus { expected } => {
                Box::new(HttpStatusProbe::new(self.http.clone(), *expected))
            }
            Check::HttpString { pattern } => {
                Box::new(HttpStringProbe::new(self.http.clone(), pattern.clone()))
            }
            Check::Icap {
                service, test_file, ..
            } => Box::new(IcapProbe::new(
                self.settings.icap_client.clone(),
                service.clone(),
                test_file.clone(),
            )),
        }
    }

    /// Deadline the strategy for `check` enforces on itself.
    ///
    /// For TCP this bounds each connection attempt, not the whole probe.
    pub fn deadline(&self, check: &Check) -> Duration {
        match check {
            Check::Icmp => self.settings.ping_wait,
            Check::Tcp { .. } => self.settings.tcp_timeout,
            Check::HttpStatus { .. } | Check::HttpString { .. } => self.settings.http_timeout,
            Check::Icap { timeout, .. } => *timeout,
        }
    }

    /// Whether ICMP probes go through the raw-socket backend.
    pub fn uses_raw_icmp(&self) -> bool {
        self.settings.icmp_backend == IcmpBackend::Socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Protocol;
    use regex::Regex;

    fn registry() -> ProbeRegistry {
        ProbeRegistry::new(ProbeSettings::default()).unwrap()
    }

    #[test]
    fn test_strategy_matches_check() {
        let registry = registry();
        let checks = [
            (Check::Icmp, Protocol::Icmp),
            (Check::Tcp { port: 22 }, Protocol::Tcp),
            (Check::HttpStatus { expected: 200 }, Protocol::HttpStatus),
            (
                Check::HttpString {
                    pattern: Regex::new("ok").unwrap(),
                },
                Protocol::HttpString,
            ),
            (
                Check::Icap {
                    service: "avscan".to_string(),
                    test_file: "/tmp/clean.txt".into(),
                    timeout: Duration::from_secs(10),
                },
                Protocol::Icap,
            ),
        ];

        for (check, protocol) in &checks {
            assert_eq!(registry.strategy(check).protocol(), *protocol);
        }
    }

    #[test]
    fn test_default_deadlines() {
        let registry = registry();
        assert_eq!(registry.deadline(&Check::Icmp), Duration::from_secs(2));
        assert_eq!(
            registry.deadline(&Check::Tcp { port: 443 }),
            Duration::from_secs(5)
        );
        assert_eq!(
            registry.deadline(&Check::HttpStatus { expected: 200 }),
            Duration::from_secs(5)
        );
        assert_eq!(
            registry.deadline(&Check::Icap {
                service: "avscan".to_string(),
                test_file: "/tmp/clean.txt".into(),
                timeout: Duration::from_secs(12),
            }),
            Duration::from_secs(12)
        );
        assert!(!registry.uses_raw_icmp());
    }
}
