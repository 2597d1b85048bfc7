// # HTTP Address Lookup
//
// This crate provides the HTTP text-scraping lookup for the DDNS system.
//
// ## Purpose
//
// Asks "what is my IP" services for the public address. Their answers are
// free-form text (plain address, HTML page, JSON), so the first substring
// that looks like an address of the wanted family and parses as one is
// taken.
//
// ## Architecture
//
// One GET per lookup, 10 second timeout, no retries. At most 16 KiB of the
// body is read; the address is expected near the top. Failover between
// endpoints belongs to `ddns_core::discovery`, which rotates the endpoint
// to the back of its queue when this lookup fails.

use ddns_core::traits::{AddressLookup, IpVersion};
use ddns_core::{Error, Result};

use regex::Regex;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Largest part of a response body that is read
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Dotted quad with every octet in 0..=255
const IPV4_PATTERN: &str = concat!(
    r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.",
    r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.",
    r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.",
    r"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)",
);

/// Colon-separated hex groups, optionally ending in an embedded IPv4
///
/// Deliberately loose: candidates are confirmed by parsing.
const IPV6_PATTERN: &str =
    r"(?:[0-9A-Fa-f]{0,4}:){2,7}(?:[0-9A-Fa-f]{1,4}|(?:[0-9]{1,3}\.){3}[0-9]{1,3})?";

/// HTTP-based address lookup for one address family
#[derive(Debug, Clone)]
pub struct HttpLookup {
    version: IpVersion,
    pattern: Regex,
    client: reqwest::Client,
}

impl HttpLookup {
    /// Create a lookup for `version` with the default timeout
    pub fn new(version: IpVersion) -> Result<Self> {
        Self::with_timeout(version, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create an IPv4 lookup
    pub fn ipv4() -> Result<Self> {
        Self::new(IpVersion::V4)
    }

    /// Create an IPv6 lookup
    pub fn ipv6() -> Result<Self> {
        Self::new(IpVersion::V6)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(version: IpVersion, timeout: Duration) -> Result<Self> {
        let pattern = match version {
            IpVersion::V4 => IPV4_PATTERN,
            IpVersion::V6 => IPV6_PATTERN,
        };
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid {} pattern: {}", version, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            version,
            pattern,
            client,
        })
    }

    pub fn version(&self) -> IpVersion {
        self.version
    }

    /// First address of this lookup's family found in `text`
    pub fn extract(&self, text: &str) -> Option<IpAddr> {
        self.pattern
            .find_iter(text)
            .filter_map(|m| m.as_str().parse::<IpAddr>().ok())
            .find(|ip| IpVersion::of(ip) == self.version)
    }

    /// Fetch the start of the body of `url`, at most [`MAX_BODY_BYTES`]
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!("HTTP error: {}", response.status())));
        }

        let mut body = Vec::new();
        while body.len() < MAX_BODY_BYTES {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;
            let Some(chunk) = chunk else {
                break;
            };
            let room = MAX_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait::async_trait]
impl AddressLookup for HttpLookup {
    async fn lookup(&self, source: &str) -> Result<IpAddr> {
        let body = self.fetch(source).await?;

        let ip = self.extract(&body).ok_or_else(|| {
            Error::discovery(format!("no {} address matched in response", self.version))
        })?;

        debug!(%source, %ip, "Address extracted from response");
        Ok(ip)
    }
}
