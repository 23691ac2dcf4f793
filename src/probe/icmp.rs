//! ICMP echo probe.
//!
//! Sends a single echo request through one of two backends:
//!
//! - [`IcmpBackend::Command`]: the system `ping` utility (no privileges needed)
//! - [`IcmpBackend::Socket`]: a raw ICMP socket via `surge-ping`

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::process::Command;
use tokio::time::timeout;

use crate::probe::traits::timed;
use crate::probe::{Probe, ProbeError, ProbeResult};
use crate::resolver::ResolvedTarget;
use crate::target::Protocol;

/// Extra time granted to the ping utility beyond its own `-w` deadline.
const COMMAND_GRACE: Duration = Duration::from_secs(1);

/// How echo requests are sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IcmpBackend {
    /// Spawn the external ping utility.
    #[default]
    Command,
    /// Use a raw ICMP socket.
    Socket,
}

/// ICMP echo probe.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    backend: IcmpBackend,
    program: String,
}

impl IcmpProbe {
    /// Create a probe using `backend`; `program` is the ping utility used by
    /// the command backend.
    pub fn new(backend: IcmpBackend, program: impl Into<String>) -> Self {
        Self {
            backend,
            program: program.into(),
        }
    }

    /// `ping -c1 -w<secs> <host>`; passes on exit status zero.
    async fn ping_command(&self, host: &str, deadline: Duration) -> Result<String, ProbeError> {
        let wait_secs = deadline.as_secs().max(1);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-c1")
            .arg(format!("-w{wait_secs}"))
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let bound = Duration::from_secs(wait_secs) + COMMAND_GRACE;
        let status = match timeout(bound, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ProbeError::Spawn {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => return Err(ProbeError::Timeout(bound)),
        };

        if status.success() {
            Ok(String::new())
        } else {
            Err(ProbeError::Process {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }

    /// One echo over a raw socket; passes when a reply arrives.
    async fn ping_socket(&self, host: &str, deadline: Duration) -> Result<String, ProbeError> {
        let ip = timeout(deadline, resolve_host(host))
            .await
            .map_err(|_| ProbeError::Timeout(deadline))??;

        let client = match ip {
            IpAddr::V4(_) => Client::new(&Config::default())?,
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build())?,
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(deadline);

        match timeout(deadline, pinger.ping(PingSequence(0), &[])).await {
            Ok(Ok((_, rtt))) => Ok(format!("rtt {:.2}ms", rtt.as_secs_f64() * 1000.0)),
            Ok(Err(e)) => Err(ProbeError::Icmp(e)),
            Err(_) => Err(ProbeError::Timeout(deadline)),
        }
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, ProbeError> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    // Otherwise, resolve the hostname using tokio's DNS lookup
    let mut addrs = tokio::net::lookup_host((host, 0)).await?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Resolution(host.to_string()))
}

#[async_trait::async_trait]
impl Probe for IcmpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Icmp
    }

    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult {
        let (elapsed, outcome) = match self.backend {
            IcmpBackend::Command => timed(self.ping_command(&target.host, deadline)).await,
            IcmpBackend::Socket => timed(self.ping_socket(&target.host, deadline)).await,
        };

        match &outcome {
            Ok(_) => {
                tracing::debug!(
                    host = %target.host,
                    backend = %self.backend,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    "Ping probe successful"
                );
            }
            Err(e) => {
                tracing::warn!(
                    host = %target.host,
                    backend = %self.backend,
                    error = %e,
                    "Ping probe failed"
                );
            }
        }

        ProbeResult::from_outcome(elapsed, outcome)
    }
}
