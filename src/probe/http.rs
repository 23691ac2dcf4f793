//! HTTP endpoint probes.
//!
//! Both probes issue a single GET against the canonical URL:
//!
//! - [`HttpStatusProbe`]: passes when the status code matches exactly
//! - [`HttpStringProbe`]: passes when the body contains a regex match

use std::time::Duration;

use regex::Regex;
use reqwest::{Client, Response};
use tokio::time::timeout;

use crate::probe::traits::timed;
use crate::probe::{Probe, ProbeError, ProbeResult};
use crate::resolver::ResolvedTarget;
use crate::target::Protocol;

/// Build the HTTP client shared by all HTTP probes of a run.
///
/// Certificate checks are off unless `verify_tls` is set: targets are
/// expected to be internal services with self-signed certificates.
///
/// # Errors
/// Returns the underlying error if the TLS backend cannot be initialized.
pub fn build_client(request_timeout: Duration, verify_tls: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(request_timeout)
        .danger_accept_invalid_certs(!verify_tls)
        .user_agent(concat!("healthprobe/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Issue the GET, mapping an elapsed deadline to [`ProbeError::Timeout`].
async fn fetch(client: &Client, url: &str, deadline: Duration) -> Result<Response, ProbeError> {
    match timeout(deadline, client.get(url).send()).await {
        Ok(response) => Ok(response?),
        Err(_) => Err(ProbeError::Timeout(deadline)),
    }
}

/// GET probe expecting an exact status code.
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    client: Client,
    expected: u16,
}

impl HttpStatusProbe {
    /// Create a probe expecting `expected`.
    pub fn new(client: Client, expected: u16) -> Self {
        Self { client, expected }
    }

    async fn check(&self, url: &str, deadline: Duration) -> Result<String, ProbeError> {
        let response = fetch(&self.client, url, deadline).await?;
        let actual = response.status().as_u16();
        if actual == self.expected {
            Ok(actual.to_string())
        } else {
            Err(ProbeError::Status {
                expected: self.expected,
                actual,
            })
        }
    }
}

#[async_trait::async_trait]
impl Probe for HttpStatusProbe {
    fn protocol(&self) -> Protocol {
        Protocol::HttpStatus
    }

    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult {
        let (elapsed, outcome) = timed(self.check(&target.url, deadline)).await;

        match &outcome {
            Ok(status) => {
                tracing::debug!(url = %target.url, status = %status, "HTTP status probe successful");
            }
            Err(e) => {
                tracing::warn!(url = %target.url, expected = self.expected, error = %e, "HTTP status probe failed");
            }
        }

        ProbeResult::from_outcome(elapsed, outcome)
    }
}

/// GET probe searching the body for a pattern.
#[derive(Debug, Clone)]
pub struct HttpStringProbe {
    client: Client,
    pattern: Regex,
}

impl HttpStringProbe {
    /// Create a probe searching for `pattern`.
    pub fn new(client: Client, pattern: Regex) -> Self {
        Self { client, pattern }
    }

    async fn check(&self, url: &str, deadline: Duration) -> Result<String, ProbeError> {
        // The body read shares the request deadline.
        let body = timeout(deadline, async {
            let response = fetch(&self.client, url, deadline).await?;
            Ok::<_, ProbeError>(response.text().await?)
        })
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;

        self.pattern
            .find(&body)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ProbeError::PatternNotFound(self.pattern.as_str().to_string()))
    }
}

#[async_trait::async_trait]
impl Probe for HttpStringProbe {
    fn protocol(&self) -> Protocol {
        Protocol::HttpString
    }

    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult {
        let (elapsed, outcome) = timed(self.check(&target.url, deadline)).await;

        match &outcome {
            Ok(matched) => {
                tracing::debug!(url = %target.url, matched = %matched, "HTTP string probe successful");
            }
            Err(e) => {
                tracing::warn!(url = %target.url, pattern = %self.pattern, error = %e, "HTTP string probe failed");
            }
        }

        ProbeResult::from_outcome(elapsed, outcome)
    }
}
