// # UDP Probe Address Lookup
//
// This crate finds the host's global IPv6 address without asking any
// remote service.
//
// ## How It Works
//
// A UDP socket is "connected" to an anchor address (port 0). Connecting a
// datagram socket sends no packet; it only makes the kernel pick a route
// and a source address for that destination. The socket's local address is
// then the address the host would use to reach the internet.
//
// ## Validation
//
// Hosts without global connectivity still get a source address picked, so
// addresses that cannot be published are rejected:
// loopback, unspecified, link-local (fe80::/10), unique-local (fc00::/7)
// and multicast. The caller then moves on to its next source.
//
// ## Platform Support
//
// Anything tokio supports. IPv4 anchors work too, but the IPv4 address seen
// locally is usually behind NAT, so the daemon only uses this for IPv6.

use ddns_core::traits::{AddressLookup, IpVersion};
use ddns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// Default time allowed for binding and connecting the probe socket
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Local-socket address lookup
///
/// Sources are IP addresses (`"2400:3200::1"`), not URLs.
#[derive(Debug, Clone)]
pub struct UdpProbe {
    timeout: Duration,
}

impl UdpProbe {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Source address the kernel selects for `anchor`
    async fn local_address_towards(&self, anchor: IpAddr) -> Result<IpAddr> {
        let bind: SocketAddr = match anchor {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let probe = async {
            let socket = UdpSocket::bind(bind).await?;
            socket.connect((anchor, 0)).await?;
            socket.local_addr()
        };

        let local = tokio::time::timeout(self.timeout, probe)
            .await
            .map_err(|_| Error::discovery(format!("probe towards {} timed out", anchor)))??;

        Ok(local.ip())
    }
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that `ip` can be published as the host's public address
pub fn validate(ip: IpAddr) -> Result<IpAddr> {
    let reason = match ip {
        _ if ip.is_unspecified() => Some("unspecified"),
        _ if ip.is_loopback() => Some("loopback"),
        _ if ip.is_multicast() => Some("multicast"),
        IpAddr::V4(v4) if v4.is_link_local() => Some("link-local"),
        IpAddr::V4(v4) if v4.is_private() => Some("private"),
        IpAddr::V6(v6) if v6.segments()[0] & 0xffc0 == 0xfe80 => Some("link-local"),
        IpAddr::V6(v6) if v6.segments()[0] & 0xfe00 == 0xfc00 => Some("unique-local"),
        _ => None,
    };

    match reason {
        Some(reason) => Err(Error::discovery(format!(
            "local address {} is {}, not publishable",
            ip, reason
        ))),
        None => Ok(ip),
    }
}

#[async_trait::async_trait]
impl AddressLookup for UdpProbe {
    async fn lookup(&self, source: &str) -> Result<IpAddr> {
        let anchor: IpAddr = source.trim().parse().map_err(|_| {
            Error::invalid_input(format!("probe anchor '{}' is not an IP address", source))
        })?;

        let local = self.local_address_towards(anchor).await?;
        debug!(%source, %local, version = %IpVersion::of(&local), "Probe picked local address");

        validate(local)
    }
}
