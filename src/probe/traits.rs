//! Core probe trait and result types.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::resolver::ResolvedTarget;
use crate::target::Protocol;

/// Reasons a probe can fail.
///
/// These never escape a strategy: [`ProbeResult::failed`] folds them into a
/// failed result so one bad target cannot abort the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Network I/O error (refused, unreachable, DNS).
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// Deadline elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Name resolution produced no candidate address.
    #[error("no address found for {0}")]
    Resolution(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response status differs from the expected one.
    #[error("status {actual}, expected {expected}")]
    Status {
        /// Configured status code.
        expected: u16,
        /// Status code received.
        actual: u16,
    },

    /// Body contains no match for the pattern.
    #[error("pattern '{0}' not found in body")]
    PatternNotFound(String),

    /// External program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// External program exited unsuccessfully.
    #[error("'{program}' exited with {status}")]
    Process {
        /// Program name or path.
        program: String,
        /// Exit status description.
        status: String,
    },

    /// ICMP socket error.
    #[error("icmp error: {0}")]
    Icmp(#[from] surge_ping::SurgeError),

    /// A local file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    File {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The ICAP client reported success but wrote nothing.
    #[error("output file {0} was not written")]
    MissingOutput(PathBuf),

    /// Scanned content differs from the original.
    #[error("content digest mismatch: sent {sent}, received {received}")]
    ContentMismatch {
        /// MD5 of the test file.
        sent: String,
        /// MD5 of the returned content.
        received: String,
    },
}

/// Outcome of one probe execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Whether the check passed.
    pub passed: bool,
    /// Wall-clock duration of the check in milliseconds.
    pub latency_ms: f64,
    /// Status code, matched text, digest or failure reason.
    pub detail: String,
}

impl ProbeResult {
    /// A passing result.
    pub fn passed(elapsed: Duration, detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            latency_ms: duration_ms(elapsed),
            detail: detail.into(),
        }
    }

    /// A failing result carrying the error text as detail.
    pub fn failed(elapsed: Duration, error: &ProbeError) -> Self {
        Self {
            passed: false,
            latency_ms: duration_ms(elapsed),
            detail: error.to_string(),
        }
    }

    /// Fold a strategy outcome into a result.
    pub fn from_outcome(elapsed: Duration, outcome: Result<String, ProbeError>) -> Self {
        match outcome {
            Ok(detail) => Self::passed(elapsed, detail),
            Err(e) => Self::failed(elapsed, &e),
        }
    }
}

/// Milliseconds as a float, the unit every report uses.
pub fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Run `check` and time it from start to completion.
pub(crate) async fn timed<F>(check: F) -> (Duration, Result<String, ProbeError>)
where
    F: std::future::Future<Output = Result<String, ProbeError>>,
{
    let start = Instant::now();
    let outcome = check.await;
    (start.elapsed(), outcome)
}

/// A protocol-specific check strategy.
///
/// # Error Handling
///
/// `execute` is infallible by signature. Unreachable targets, timeouts,
/// non-zero exits and content mismatches are valid observations and come
/// back as `passed: false` with the reason in `detail`.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Protocol implemented by this strategy.
    fn protocol(&self) -> Protocol;

    /// Run the check against `target`, bounded by `deadline`.
    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult;
}
