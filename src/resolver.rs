//! Address normalization.
//!
//! Turns a configured address (IP literal, bare hostname, `host:port` or
//! full URL) into the canonical host and URL every probe works against.

use std::net::IpAddr;

use thiserror::Error;
use url::{Host, Url};

/// Scheme assumed when the address carries none.
const DEFAULT_SCHEME: &str = "http";

/// Error returned when no usable host can be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no usable host in address '{address}'")]
pub struct ResolveError {
    /// The offending address as configured.
    pub address: String,
}

/// Canonical form of a target address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Hostname or normalized IP (IPv6 without brackets).
    pub host: String,
    /// URL used by HTTP-style probes.
    pub url: String,
}

/// Normalize a raw address into a [`ResolvedTarget`].
///
/// # Errors
/// Returns [`ResolveError`] when the address yields no host; callers skip
/// such targets instead of counting them as failures.
pub fn resolve_address(raw: &str) -> Result<ResolvedTarget, ResolveError> {
    let address = raw.trim();

    if let Ok(ip) = address.parse::<IpAddr>() {
        let host = ip.to_string();
        let url = match ip {
            IpAddr::V4(_) => format!("{DEFAULT_SCHEME}://{host}"),
            IpAddr::V6(_) => format!("{DEFAULT_SCHEME}://[{host}]"),
        };
        return Ok(ResolvedTarget { host, url });
    }

    let url = parse_with_default_scheme(address).ok_or_else(|| ResolveError {
        address: raw.to_string(),
    })?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        _ => {
            return Err(ResolveError {
                address: raw.to_string(),
            });
        }
    };

    Ok(ResolvedTarget {
        host,
        url: canonical_url(&url, address),
    })
}

/// Parse `address` as a URL, retrying as `http://<address>` when it has no
/// scheme or when the "scheme" was really a hostname (`db.local:8080`).
fn parse_with_default_scheme(address: &str) -> Option<Url> {
    if address.is_empty() {
        return None;
    }

    match Url::parse(address) {
        Ok(url) if url.has_host() => Some(url),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("{DEFAULT_SCHEME}://{address}"))
                .ok()
                .filter(Url::has_host)
        }
        Err(_) => None,
    }
}

/// Serialize `url`, dropping the root slash the parser adds when the
/// configured address had no path.
fn canonical_url(url: &Url, address: &str) -> String {
    let serialized = url.as_str();
    if url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && !address.ends_with('/')
    {
        serialized
            .strip_suffix('/')
            .unwrap_or(serialized)
            .to_string()
    } else {
        serialized.to_string()
    }
}
