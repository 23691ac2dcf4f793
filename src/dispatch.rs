//! Probe dispatch.
//!
//! Drives every target through `Pending → Resolving → Executing → Completed`
//! and folds the results into a [`RunSummary`]. A target whose address
//! cannot be normalized stops at `Resolving` and is reported as skipped.
//! Nothing that happens to one target can abort the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::probe::{ProbeError, ProbeRegistry, ProbeResult};
use crate::resolver::resolve_address;
use crate::target::{Protocol, TargetDescriptor};

/// Lifecycle stage of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ProbeStage {
    /// Not started.
    Pending,
    /// Normalizing the address.
    Resolving,
    /// Strategy running.
    Executing,
    /// Result available.
    Completed,
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TargetOutcome {
    /// The probe ran; see `passed`.
    Completed(ProbeResult),
    /// The probe never ran and is not counted as a failure.
    Skipped {
        /// Why the target was skipped.
        reason: String,
    },
}

impl TargetOutcome {
    /// True for a completed probe that did not pass.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Completed(result) if !result.passed)
    }
}

/// Per-target entry of a run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    /// Position in the input list.
    pub index: usize,
    /// Address as configured.
    pub address: String,
    /// Protocol tag.
    pub protocol: Protocol,
    /// Short label, e.g. `tcp/443`.
    pub label: String,
    /// Canonical host, or URL for HTTP probes; the raw address if skipped.
    pub identity: String,
    /// Outcome.
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

/// Exit status reserved for runs that abort before probing, such as an
/// unreadable or invalid configuration file.
pub const FATAL_EXIT_CODE: u8 = u8::MAX;

/// Aggregate of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Completed probes that failed; the process exit status.
    pub total_failures: u64,
    /// Completed probes that passed.
    pub passed: u64,
    /// Targets skipped before execution.
    pub skipped: u64,
}

impl RunSummary {
    /// Exit status for this run: the failure count, saturated below
    /// [`FATAL_EXIT_CODE`].
    ///
    /// Plain truncation would turn 256 failures into a success status.
    pub fn exit_code(&self) -> u8 {
        const MAX_FAILURE_CODE: u8 = FATAL_EXIT_CODE - 1;
        u8::try_from(self.total_failures)
            .unwrap_or(MAX_FAILURE_CODE)
            .min(MAX_FAILURE_CODE)
    }
}

/// All target reports of a run, in input order, with the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// One entry per input target.
    pub targets: Vec<TargetReport>,
    /// Aggregate counts.
    pub summary: RunSummary,
}

/// Runs targets through their strategies.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ProbeRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: ProbeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Probe every target and return reports in input order.
    ///
    /// Runs sequentially when `settings.concurrency` is 1, otherwise keeps
    /// at most that many probes in flight.
    pub async fn run(&self, targets: &[TargetDescriptor]) -> RunReport {
        let concurrency = self.registry.settings().concurrency.max(1);
        tracing::info!(targets = targets.len(), concurrency, "Starting probe run");

        let report = if concurrency == 1 || targets.len() <= 1 {
            self.run_sequential(targets).await
        } else {
            self.run_concurrent(targets, concurrency).await
        };

        tracing::info!(
            failures = report.summary.total_failures,
            passed = report.summary.passed,
            skipped = report.summary.skipped,
            "Probe run complete"
        );
        report
    }

    async fn run_sequential(&self, targets: &[TargetDescriptor]) -> RunReport {
        let mut reports = Vec::with_capacity(targets.len());
        let mut failures = 0u64;

        for (index, descriptor) in targets.iter().enumerate() {
            let report = probe_target(&self.registry, index, descriptor).await;
            if report.outcome.is_failure() {
                failures += 1;
            }
            reports.push(report);
        }

        finish(reports, failures)
    }

    async fn run_concurrent(&self, targets: &[TargetDescriptor], concurrency: usize) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let failures = Arc::new(AtomicU64::new(0));
        let mut tasks = JoinSet::new();

        for (index, descriptor) in targets.iter().enumerate() {
            let registry = Arc::clone(&self.registry);
            let semaphore = Arc::clone(&semaphore);
            let failures = Arc::clone(&failures);
            let descriptor = descriptor.clone();

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                let report = probe_target(&registry, index, &descriptor).await;
                if report.outcome.is_failure() {
                    failures.fetch_add(1, Ordering::Relaxed);
                }
                report
            });
        }

        let mut slots: Vec<Option<TargetReport>> = vec![None; targets.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    let index = report.index;
                    slots[index] = Some(report);
                }
                Err(e) => tracing::error!(error = %e, "Probe task aborted"),
            }
        }

        // A task that panicked left its slot empty; report it as failed.
        let reports = slots
            .into_iter()
            .zip(targets)
            .enumerate()
            .map(|(index, (slot, descriptor))| {
                slot.unwrap_or_else(|| {
                    failures.fetch_add(1, Ordering::Relaxed);
                    TargetReport {
                        index,
                        address: descriptor.address.clone(),
                        protocol: descriptor.protocol(),
                        label: descriptor.label(),
                        identity: descriptor.address.clone(),
                        outcome: TargetOutcome::Completed(ProbeResult {
                            passed: false,
                            latency_ms: 0.0,
                            detail: "probe task aborted".to_string(),
                        }),
                    }
                })
            })
            .collect();

        finish(reports, failures.load(Ordering::Relaxed))
    }
}

fn finish(reports: Vec<TargetReport>, total_failures: u64) -> RunReport {
    let mut summary = RunSummary {
        total_failures,
        ..RunSummary::default()
    };

    for report in &reports {
        match &report.outcome {
            TargetOutcome::Completed(result) if result.passed => summary.passed += 1,
            TargetOutcome::Completed(_) => {}
            TargetOutcome::Skipped { .. } => summary.skipped += 1,
        }
    }

    RunReport {
        targets: reports,
        summary,
    }
}

/// Run one target to completion or skip.
pub async fn probe_target(
    registry: &ProbeRegistry,
    index: usize,
    descriptor: &TargetDescriptor,
) -> TargetReport {
    let mut stage = ProbeStage::Pending;
    let label = descriptor.label();
    let report = |identity: String, outcome: TargetOutcome| TargetReport {
        index,
        address: descriptor.address.clone(),
        protocol: descriptor.protocol(),
        label: label.clone(),
        identity,
        outcome,
    };

    advance(&mut stage, ProbeStage::Resolving, index);
    let resolved = match resolve_address(&descriptor.address) {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::warn!(index, address = %descriptor.address, error = %e, "Skipping unresolvable target");
            return report(
                descriptor.address.clone(),
                TargetOutcome::Skipped {
                    reason: e.to_string(),
                },
            );
        }
    };

    advance(&mut stage, ProbeStage::Executing, index);
    let strategy = registry.strategy(&descriptor.check);
    let deadline = registry.deadline(&descriptor.check);
    let outer = registry.settings().target_timeout.max(deadline);

    let start = Instant::now();
    let result = match timeout(outer, strategy.execute(&resolved, deadline)).await {
        Ok(result) => result,
        Err(_) => {
            let err = ProbeError::Timeout(outer);
            tracing::warn!(index, address = %descriptor.address, error = %err, "Probe exceeded target timeout");
            ProbeResult::failed(start.elapsed(), &err)
        }
    };

    advance(&mut stage, ProbeStage::Completed, index);
    tracing::info!(
        index,
        protocol = %descriptor.protocol(),
        host = %resolved.host,
        passed = result.passed,
        latency_ms = result.latency_ms,
        "Target probed"
    );

    let identity = if descriptor.identified_by_url() {
        resolved.url
    } else {
        resolved.host
    };
    report(identity, TargetOutcome::Completed(result))
}

fn advance(stage: &mut ProbeStage, next: ProbeStage, index: usize) {
    tracing::trace!(index, from = %stage, to = %next, "Target stage change");
    *stage = next;
}
