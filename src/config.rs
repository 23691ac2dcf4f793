//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Probe settings (timeouts, concurrency, external programs)
//! - Host entries and their conversion into target descriptors

mod app;
mod hosts;
mod validation;

pub use app::{AppConfig, ProbeSettings};
pub use hosts::{HostEntry, LoadedTargets, OmittedEntry, load_targets};
pub use validation::{ConfigError, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_CONCURRENCY, DEFAULT_CONFIG_PATH, DEFAULT_HTTP_TIMEOUT, DEFAULT_ICAP_CLIENT,
    DEFAULT_PING_PROGRAM, DEFAULT_PING_WAIT, DEFAULT_TARGET_TIMEOUT, DEFAULT_TCP_TIMEOUT,
};
