//! URL vetting (SSRF prevention)
//!
//! Rejects URLs that must never be fetched on a caller's behalf: non-HTTP
//! schemes, URLs without a network location, and hosts that point at the
//! local machine or a private network.
//!
//! ## Limitations
//!
//! This is a purely syntactic check. No DNS resolution is performed, so a
//! public hostname that resolves to a private address (DNS rebinding) is
//! accepted. Callers that need that guarantee must pin the resolved
//! address in their fetcher.

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::debug;
use url::{Host, Url};

use crate::models::{UrlReason, ValidationVerdict};

/// Schemes that may be fetched.
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Cloud instance metadata service names.
const METADATA_HOSTS: &[&str] = &[
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "instance-data",
    "instance-data.ec2.internal",
];

/// Stateless URL validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlValidator;

impl UrlValidator {
    /// Create a validator
    pub const fn new() -> Self {
        Self
    }

    /// Validate `url`, always returning a verdict.
    pub fn validate(&self, url: &str) -> ValidationVerdict {
        match self.check(url) {
            Ok(_) => ValidationVerdict::allow(),
            Err(verdict) => verdict,
        }
    }

    /// Validate `url` and return the parsed form when it is allowed.
    pub fn check(&self, url: &str) -> Result<Url, ValidationVerdict> {
        let parsed = Url::parse(url.trim()).map_err(|e| {
            debug!(error = %e, "url failed to parse");
            ValidationVerdict::reject(UrlReason::Malformed)
        })?;

        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            debug!(scheme = parsed.scheme(), "url scheme rejected");
            return Err(ValidationVerdict::reject(UrlReason::BadScheme));
        }

        let blocked = match parsed.host() {
            None => return Err(ValidationVerdict::reject(UrlReason::Malformed)),
            Some(Host::Domain(domain)) => is_blocked_domain(domain),
            Some(Host::Ipv4(addr)) => is_blocked_ipv4(addr),
            Some(Host::Ipv6(addr)) => is_blocked_ipv6(addr),
        };

        if blocked {
            debug!(host = ?parsed.host_str(), "url host rejected");
            return Err(ValidationVerdict::reject(UrlReason::BlockedHost));
        }

        Ok(parsed)
    }
}

fn is_blocked_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain.is_empty()
        || domain == "localhost"
        || domain.ends_with(".localhost")
        || METADATA_HOSTS.contains(&domain.as_str())
}

fn is_blocked_ipv4(addr: Ipv4Addr) -> bool {
    addr.is_loopback()          // 127.0.0.0/8
        || addr.octets()[0] == 0 // 0.0.0.0/8
        || addr.is_private()     // 10/8, 172.16/12, 192.168/16
        || addr.is_link_local() // 169.254/16, cloud metadata
}

fn is_blocked_ipv6(addr: Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }
    let segments = addr.segments();
    // ::a.b.c.d, deprecated IPv4-compatible form
    if segments[..6] == [0; 6] {
        let [.., a, b, c, d] = addr.octets();
        return is_blocked_ipv4(Ipv4Addr::new(a, b, c, d));
    }
    let first = segments[0];
    addr.is_loopback()                  // ::1
        || addr.is_unspecified()         // ::
        || (first & 0xfe00) == 0xfc00    // fc00::/7 unique local
        || (first & 0xffc0) == 0xfe80 // fe80::/10 link local
}
