//! Target descriptors.
//!
//! A [`TargetDescriptor`] is the typed, validated form of one configured
//! host entry. The protocol is a closed enum and each [`Check`] variant
//! carries exactly the fields its probe needs, so a descriptor that exists
//! is always runnable.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Protocol tag as written in the `prot` field of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    /// ICMP echo.
    Icmp,
    /// TCP connect.
    Tcp,
    /// HTTP GET with an expected status code.
    HttpStatus,
    /// HTTP GET with a body pattern.
    HttpString,
    /// ICAP content-scan round trip.
    Icap,
}

/// Protocol-specific parameters of a target.
#[derive(Debug, Clone)]
pub enum Check {
    /// Single ICMP echo request.
    Icmp,
    /// TCP connect to `port`.
    Tcp {
        /// Destination port.
        port: u16,
    },
    /// GET must answer with exactly `expected`.
    HttpStatus {
        /// Expected status code.
        expected: u16,
    },
    /// GET body must contain a match for `pattern`.
    HttpString {
        /// Pattern searched anywhere in the body.
        pattern: Regex,
    },
    /// Send `test_file` through `service` and expect it back unchanged.
    Icap {
        /// ICAP service name.
        service: String,
        /// Clean file sent through the scanner.
        test_file: PathBuf,
        /// Bound on the client invocation.
        timeout: Duration,
    },
}

impl Check {
    /// The protocol tag of this check.
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Icmp => Protocol::Icmp,
            Self::Tcp { .. } => Protocol::Tcp,
            Self::HttpStatus { .. } => Protocol::HttpStatus,
            Self::HttpString { .. } => Protocol::HttpString,
            Self::Icap { .. } => Protocol::Icap,
        }
    }
}

/// One configured endpoint.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    /// Raw address as configured (IP, hostname or URL).
    pub address: String,
    /// What to check and how.
    pub check: Check,
}

impl TargetDescriptor {
    /// Create a descriptor.
    pub fn new(address: impl Into<String>, check: Check) -> Self {
        Self {
            address: address.into(),
            check,
        }
    }

    /// The protocol tag of this target.
    pub fn protocol(&self) -> Protocol {
        self.check.protocol()
    }

    /// Short label used in reports, e.g. `ping` or `tcp/443`.
    pub fn label(&self) -> String {
        match &self.check {
            Check::Icmp => "ping".to_string(),
            Check::Tcp { port } => format!("tcp/{port}"),
            other => other.protocol().to_string(),
        }
    }

    /// Whether the report should identify this target by URL instead of host.
    pub fn identified_by_url(&self) -> bool {
        matches!(
            self.check,
            Check::HttpStatus { .. } | Check::HttpString { .. }
        )
    }
}
