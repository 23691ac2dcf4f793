//! healthprobe - one-shot endpoint health probes
//!
//! Probes a configured list of endpoints once with a protocol-specific check
//! and reports pass/fail with latency for each. The number of failed probes
//! becomes the process exit status, so the binary plugs straight into cron,
//! a supervisor or an orchestrator health hook.
//!
//! # Architecture
//!
//! - **Config**: YAML settings and host entries, converted to [`TargetDescriptor`]s
//! - **Resolver**: canonical host and URL for each configured address
//! - **Probes**: ICMP, TCP, HTTP status, HTTP body pattern and ICAP strategies
//! - **Dispatch**: runs targets sequentially or concurrently and aggregates failures
//! - **Report**: colorized text or JSON output
//!
//! # Example
//!
//! ```rust,no_run
//! use healthprobe::{AppConfig, Dispatcher, ProbeRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("/opt/healthcheck/config.yml")?;
//!     let loaded = config.targets();
//!
//!     let dispatcher = Dispatcher::new(ProbeRegistry::new(config.settings.clone())?);
//!     let report = dispatcher.run(&loaded.targets).await;
//!
//!     std::process::exit(i32::from(report.summary.exit_code()));
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod target;

pub use config::{AppConfig, ConfigError, ProbeSettings};
pub use dispatch::{Dispatcher, RunReport, RunSummary, TargetOutcome, TargetReport};
pub use probe::{Probe, ProbeError, ProbeRegistry, ProbeResult};
pub use resolver::{ResolveError, ResolvedTarget, resolve_address};
pub use target::{Check, Protocol, TargetDescriptor};
