//! Host entries and their conversion into target descriptors.
//!
//! The `hosts` list is kept as raw YAML until each entry is converted on its
//! own, so a mistyped field costs that entry only and never the whole file.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_yaml::Value;

use crate::target::{Check, Protocol, TargetDescriptor};

use super::validation::ConfigError;

/// One entry of the `hosts` list, as written in the file.
///
/// Every field is optional at this level; which ones are required depends
/// on `prot` and is checked by [`HostEntry::to_descriptor`]. Numeric fields
/// also accept numeric strings (`tcpport: "5432"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    /// IP, hostname or URL.
    pub address: Option<String>,
    /// Protocol tag (`icmp`, `tcp`, `httpstatus`, `httpstring`, `icap`).
    pub prot: Option<String>,
    /// Port for `tcp`.
    #[serde(default, deserialize_with = "lenient_number")]
    pub tcpport: Option<u16>,
    /// Expected status for `httpstatus`.
    #[serde(default, deserialize_with = "lenient_number")]
    pub httpstatus: Option<u16>,
    /// Body regex for `httpstring`.
    pub httpstring: Option<String>,
    /// ICAP service name for `icap`.
    pub icapservice: Option<String>,
    /// Clean test file for `icap`.
    pub icaptestfile: Option<PathBuf>,
    /// Client timeout in seconds for `icap`; fractions allowed.
    #[serde(default, deserialize_with = "lenient_number")]
    pub icaptimeout: Option<f64>,
}

/// Accept either a YAML number or a string holding one.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<N> {
        Number(N),
        Text(String),
    }

    match Option::<Raw<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("'{text}' is not a valid number: {e}"))),
    }
}

impl HostEntry {
    /// Decode one raw `hosts` item.
    ///
    /// # Errors
    /// Returns `ConfigError::Omission` when the item is not a mapping or a
    /// field has a value of the wrong type.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, ConfigError> {
        serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::Omission {
            index,
            reason: format!("invalid entry: {e}"),
        })
    }

    /// Convert into a descriptor, checking the fields `prot` requires.
    ///
    /// # Errors
    /// Returns `ConfigError::Omission` when the address or a required field
    /// is missing, the protocol is unknown, or the pattern does not compile.
    pub fn to_descriptor(&self, index: usize) -> Result<TargetDescriptor, ConfigError> {
        let omission = |reason: String| ConfigError::Omission { index, reason };

        let address = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| omission("missing 'address'".to_string()))?;

        let prot = self
            .prot
            .as_deref()
            .ok_or_else(|| omission("missing 'prot'".to_string()))?;
        let protocol: Protocol = prot
            .trim()
            .parse()
            .map_err(|_| omission(format!("unknown protocol '{prot}'")))?;

        let check = match protocol {
            Protocol::Icmp => Check::Icmp,
            Protocol::Tcp => Check::Tcp {
                port: require(self.tcpport, "tcpport", index)?,
            },
            Protocol::HttpStatus => Check::HttpStatus {
                expected: require(self.httpstatus, "httpstatus", index)?,
            },
            Protocol::HttpString => {
                let raw = require(self.httpstring.as_deref(), "httpstring", index)?;
                let pattern = Regex::new(raw)
                    .map_err(|e| omission(format!("invalid 'httpstring' pattern: {e}")))?;
                Check::HttpString { pattern }
            }
            Protocol::Icap => {
                let seconds = require(self.icaptimeout, "icaptimeout", index)?;
                let timeout = Duration::try_from_secs_f64(seconds)
                    .ok()
                    .filter(|t| !t.is_zero())
                    .ok_or_else(|| omission("'icaptimeout' must be positive".to_string()))?;
                Check::Icap {
                    service: require(self.icapservice.clone(), "icapservice", index)?,
                    test_file: require(self.icaptestfile.clone(), "icaptestfile", index)?,
                    timeout,
                }
            }
        };

        Ok(TargetDescriptor::new(address, check))
    }
}

fn require<T>(value: Option<T>, field: &str, index: usize) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Omission {
        index,
        reason: format!("missing '{field}'"),
    })
}

/// A host entry that could not become a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedEntry {
    /// Zero-based position in the `hosts` list.
    pub index: usize,
    /// Address, if the entry had one.
    pub address: Option<String>,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of converting the `hosts` list.
#[derive(Debug, Clone, Default)]
pub struct LoadedTargets {
    /// Runnable targets in configuration order.
    pub targets: Vec<TargetDescriptor>,
    /// Entries skipped as configuration omissions.
    pub omitted: Vec<OmittedEntry>,
}

/// Convert every raw entry, keeping omissions aside instead of failing.
pub fn load_targets(entries: &[Value]) -> LoadedTargets {
    let mut loaded = LoadedTargets::default();

    for (index, value) in entries.iter().enumerate() {
        let converted =
            HostEntry::from_value(index, value).and_then(|entry| entry.to_descriptor(index));
        match converted {
            Ok(descriptor) => loaded.targets.push(descriptor),
            Err(e) => {
                let reason = match e {
                    ConfigError::Omission { reason, .. } => reason,
                    other => other.to_string(),
                };
                let address = value.get("address").and_then(Value::as_str);
                tracing::warn!(
                    index,
                    address = address.unwrap_or("-"),
                    reason = %reason,
                    "Skipping host entry"
                );
                loaded.omitted.push(OmittedEntry {
                    index,
                    address: address.map(str::to_string),
                    reason,
                });
            }
        }
    }

    loaded
}
