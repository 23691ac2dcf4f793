//! TCP connect probe.
//!
//! Measures how long it takes to open a TCP connection to a target port.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;

use crate::probe::{Probe, ProbeError, ProbeResult};
use crate::resolver::ResolvedTarget;
use crate::target::Protocol;

/// TCP connect probe against a fixed port.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
}

impl TcpProbe {
    /// Create a probe for `port`.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Try `candidates` in order, stopping at the first connection.
    ///
    /// Each attempt gets its own `deadline`. The caller's clock keeps running
    /// across attempts, so a success on a later candidate includes the time
    /// spent on the earlier ones.
    async fn connect_any(
        host: &str,
        candidates: &[SocketAddr],
        deadline: Duration,
    ) -> Result<SocketAddr, ProbeError> {
        let mut last_error = None;

        for &addr in candidates {
            match timeout(deadline, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    return Ok(addr);
                }
                Ok(Err(e)) => {
                    tracing::debug!(addr = %addr, error = %e, "TCP candidate refused");
                    last_error = Some(ProbeError::Network(e));
                }
                Err(_) => {
                    tracing::debug!(addr = %addr, timeout_ms = deadline.as_millis(), "TCP candidate timed out");
                    last_error = Some(ProbeError::Timeout(deadline));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProbeError::Resolution(host.to_string())))
    }
}

#[async_trait::async_trait]
impl Probe for TcpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult {
        let endpoint = format!("{}:{}", target.host, self.port);

        // Name lookup is bounded too, but is not part of the measured latency.
        let candidates: Vec<SocketAddr> =
            match timeout(deadline, lookup_host((target.host.as_str(), self.port))).await {
                Ok(Ok(addrs)) => addrs.collect(),
                Ok(Err(e)) => {
                    tracing::warn!(target = %endpoint, error = %e, "TCP probe failed to resolve host");
                    return ProbeResult::failed(Duration::ZERO, &ProbeError::Network(e));
                }
                Err(_) => {
                    tracing::warn!(target = %endpoint, "TCP probe timed out resolving host");
                    return ProbeResult::failed(Duration::ZERO, &ProbeError::Timeout(deadline));
                }
            };

        let start = Instant::now();
        let outcome = Self::connect_any(&target.host, &candidates, deadline).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(addr) => {
                let result = ProbeResult::passed(elapsed, addr.to_string());
                tracing::debug!(target = %endpoint, peer = %addr, latency_ms = result.latency_ms, "TCP probe successful");
                result
            }
            Err(e) => {
                tracing::warn!(target = %endpoint, error = %e, "TCP probe failed");
                ProbeResult::failed(elapsed, &e)
            }
        }
    }
}
