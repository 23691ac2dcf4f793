//! ICAP content-scan round-trip probe.
//!
//! Sends a known-clean file through an ICAP service with an external client
//! and checks that the content comes back byte-for-byte unchanged.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::probe::traits::timed;
use crate::probe::{Probe, ProbeError, ProbeResult};
use crate::resolver::ResolvedTarget;
use crate::target::Protocol;

/// Characters used for the output file suffix.
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the output file suffix.
const SUFFIX_LEN: usize = 4;

/// Read buffer size for hashing.
const HASH_CHUNK: usize = 4096;

/// Random `[A-Z0-9]{4}` suffix for the scanned output file.
fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// `<test_file><suffix>`, next to the test file.
fn output_path(test_file: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(test_file.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Hex MD5 digest of a file's content.
async fn md5_file(path: &Path) -> Result<String, ProbeError> {
    let read_error = |source| ProbeError::File {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; HASH_CHUNK];

    loop {
        let n = file.read(&mut buf).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Removes the scanned output file when dropped, whatever the outcome.
struct OutputGuard {
    path: PathBuf,
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove ICAP output file");
            }
        }
    }
}

/// ICAP round-trip probe.
#[derive(Debug, Clone)]
pub struct IcapProbe {
    client: String,
    service: String,
    test_file: PathBuf,
}

impl IcapProbe {
    /// Create a probe running `client` against `service` with `test_file`.
    pub fn new(
        client: impl Into<String>,
        service: impl Into<String>,
        test_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: client.into(),
            service: service.into(),
            test_file: test_file.into(),
        }
    }

    async fn round_trip(&self, host: &str, deadline: Duration) -> Result<String, ProbeError> {
        let sent = md5_file(&self.test_file).await?;

        let output = output_path(&self.test_file, &random_suffix());
        let _guard = OutputGuard {
            path: output.clone(),
        };

        let mut cmd = Command::new(&self.client);
        cmd.arg("-i")
            .arg(host)
            .arg("-s")
            .arg(&self.service)
            .arg("-f")
            .arg(&self.test_file)
            .arg("-o")
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match timeout(deadline, cmd.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(ProbeError::Spawn {
                    program: self.client.clone(),
                    source,
                });
            }
            Err(_) => return Err(ProbeError::Timeout(deadline)),
        };

        if !status.success() {
            return Err(ProbeError::Process {
                program: self.client.clone(),
                status: status.to_string(),
            });
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(ProbeError::MissingOutput(output));
        }

        let received = md5_file(&output).await?;

        if sent == received {
            Ok(received)
        } else {
            Err(ProbeError::ContentMismatch { sent, received })
        }
    }
}

#[async_trait::async_trait]
impl Probe for IcapProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Icap
    }

    async fn execute(&self, target: &ResolvedTarget, deadline: Duration) -> ProbeResult {
        let (elapsed, outcome) = timed(self.round_trip(&target.host, deadline)).await;

        match &outcome {
            Ok(digest) => {
                tracing::debug!(
                    host = %target.host,
                    service = %self.service,
                    digest = %digest,
                    "ICAP probe successful"
                );
            }
            Err(e) => {
                tracing::warn!(
                    host = %target.host,
                    service = %self.service,
                    error = %e,
                    "ICAP probe failed"
                );
            }
        }

        ProbeResult::from_outcome(elapsed, outcome)
    }
}
