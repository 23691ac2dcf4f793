//! Integration tests for probes that shell out to external programs.
//!
//! Fake `c-icap-client` and `ping` scripts stand in for the real tools. All
//! scripts are written before any of them runs: executing a file that another
//! test thread still holds open for writing fails with ETXTBSY.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use healthprobe::config::ProbeSettings;
use healthprobe::dispatch::probe_target;
use healthprobe::probe::{IcapProbe, Probe};
use healthprobe::{Check, ProbeRegistry, ResolvedTarget, TargetDescriptor};
use tempfile::tempdir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Argument loop shared by the fake ICAP clients: sets `$in` and `$out`.
const PARSE_ARGS: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    -f) in="$2"; shift ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn localhost() -> ResolvedTarget {
    ResolvedTarget {
        host: "127.0.0.1".to_string(),
        url: "http://127.0.0.1".to_string(),
    }
}

/// Files left in `dir` besides the test file itself.
fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.file_name().is_some_and(|n| n != "clean.txt"))
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_external_client_scenarios() {
    let bin = tempdir().unwrap();
    let data = tempdir().unwrap();

    let passthrough = write_script(bin.path(), "icap-pass", &format!("{PARSE_ARGS}cp \"$in\" \"$out\""));
    let rewrite = write_script(
        bin.path(),
        "icap-rewrite",
        &format!("{PARSE_ARGS}printf 'blocked by policy' > \"$out\""),
    );
    let failing = write_script(
        bin.path(),
        "icap-fail",
        &format!("{PARSE_ARGS}cp \"$in\" \"$out\"\nexit 3"),
    );
    let silent = write_script(bin.path(), "icap-silent", "exit 0");
    let hanging = write_script(bin.path(), "icap-hang", &format!("{PARSE_ARGS}: > \"$out\"\nsleep 10"));
    let slow_ping = write_script(bin.path(), "ping-slow", "sleep 5");

    let test_file = data.path().join("clean.txt");
    std::fs::write(&test_file, b"clean test content\n").unwrap();

    let run = |client: &Path| {
        let probe = IcapProbe::new(client.to_string_lossy(), "avscan", &test_file);
        async move { probe.execute(&localhost(), Duration::from_secs(1)).await }
    };

    // Content passed through unchanged: pass, and the output file is gone
    let result = run(&passthrough).await;
    assert!(result.passed, "unexpected failure: {}", result.detail);
    assert_eq!(result.detail.len(), 32);
    assert!(leftovers(data.path()).is_empty());

    // Content altered by the service: fail, still cleaned up
    let result = run(&rewrite).await;
    assert!(!result.passed);
    assert!(result.detail.contains("digest mismatch"));
    assert!(leftovers(data.path()).is_empty());

    // Non-zero exit even though output was written: fail, cleaned up
    let result = run(&failing).await;
    assert!(!result.passed);
    assert!(result.detail.contains("exited with"));
    assert!(leftovers(data.path()).is_empty());

    // Exit zero without writing output: fail
    let result = run(&silent).await;
    assert!(!result.passed);
    assert!(result.detail.contains("was not written"));

    // Client exceeding the ICAP timeout: fail, partial output removed
    let result = run(&hanging).await;
    assert!(!result.passed);
    assert!(result.detail.contains("timed out"));
    assert!(result.latency_ms < 5000.0);
    assert!(leftovers(data.path()).is_empty());

    // ICAP through the registry uses the configured client and descriptor timeout
    let registry = ProbeRegistry::new(ProbeSettings {
        icap_client: passthrough.to_string_lossy().into_owned(),
        ..ProbeSettings::default()
    })
    .unwrap();
    let descriptor = TargetDescriptor::new(
        "127.0.0.1",
        Check::Icap {
            service: "avscan".to_string(),
            test_file: test_file.clone(),
            timeout: Duration::from_secs(5),
        },
    );
    let report = probe_target(&registry, 0, &descriptor).await;
    assert!(!report.outcome.is_failure());
    assert_eq!(report.identity, "127.0.0.1");

    // A ping utility that hangs past the per-target bound is cut off
    let registry = ProbeRegistry::new(ProbeSettings {
        ping_program: slow_ping.to_string_lossy().into_owned(),
        ping_wait: Duration::from_secs(1),
        target_timeout: Duration::from_secs(1),
        ..ProbeSettings::default()
    })
    .unwrap();
    let descriptor = TargetDescriptor::new("192.0.2.1", Check::Icmp);
    let report = probe_target(&registry, 0, &descriptor).await;
    assert!(report.outcome.is_failure());
    match report.outcome {
        healthprobe::TargetOutcome::Completed(result) => {
            assert_eq!(result.detail, "timed out after 1s");
            assert!(result.latency_ms < 2000.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
