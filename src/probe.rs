//! Probe Layer
//!
//! One strategy per protocol, all behind the [`Probe`] trait. Strategies
//! enforce their own deadline and turn every failure into a failed
//! [`ProbeResult`].
//!
//! - [`IcmpProbe`]: single ICMP echo (ping utility or raw socket)
//! - [`TcpProbe`]: TCP connect across all resolved candidates
//! - [`HttpStatusProbe`]: GET with an exact status code
//! - [`HttpStringProbe`]: GET with a body regex
//! - [`IcapProbe`]: ICAP round trip with content digest comparison
//! - [`ProbeRegistry`]: picks the strategy and deadline for a check
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use healthprobe::probe::{Probe, TcpProbe};
//! use healthprobe::resolve_address;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let target = resolve_address("127.0.0.1")?;
//! let result = TcpProbe::new(6379).execute(&target, Duration::from_secs(5)).await;
//! println!("passed={} latency={:.2}ms", result.passed, result.latency_ms);
//! # Ok(())
//! # }
//! ```

pub mod http;
mod icap;
mod icmp;
mod registry;
mod tcp;
mod traits;

pub use http::{HttpStatusProbe, HttpStringProbe};
pub use icap::IcapProbe;
pub use icmp::{IcmpBackend, IcmpProbe};
pub use registry::ProbeRegistry;
pub use tcp::TcpProbe;
pub use traits::{Probe, ProbeError, ProbeResult, duration_ms};
