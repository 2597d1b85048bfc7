// # Address Discovery Traits
//
// Defines how the daemon learns the host's externally visible address.
//
// Two layers:
//
// - `AddressLookup`: resolve ONE source identifier (a URL, a probe anchor)
//   to an address. Implemented by `ddns-ip-http` and `ddns-ip-probe`.
// - `AddressProvider`: owns a rotating pool of sources for one address
//   family and reports whether the address changed since the last call.
//   Implemented by `discovery::Ipv4Provider` and `discovery::Ipv6Provider`.
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressProvider;
//
// let (ip, changed) = provider.refresh().await;
// if changed {
//     println!("address is now {ip}");
// }
// ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// The version of an address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// The all-zero address of this family, used as "nothing known yet"
    pub fn unspecified(self) -> IpAddr {
        match self {
            IpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// Resolves a single discovery source to an address
///
/// A lookup performs exactly one attempt. It never retries and never
/// remembers previous answers; failover between sources belongs to the
/// [`AddressProvider`] that owns the source pool.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    /// Query `source` and return the address it reports
    ///
    /// # Errors
    ///
    /// Any failure (unreachable source, unreadable body, no address in the
    /// response, wrong address family) is an error. The caller rotates the
    /// source to the back of its queue.
    async fn lookup(&self, source: &str) -> Result<IpAddr, crate::Error>;
}

/// Discovers the current address of one family
///
/// # Threading
///
/// Providers are owned and driven by the daemon's control loop only. They
/// take `&mut self` and hold no locks.
#[async_trait]
pub trait AddressProvider: Send {
    /// Re-discover the address
    ///
    /// Returns the current address and whether it differs from the value
    /// returned by the previous call. When every source fails the last known
    /// address is returned with `changed == false`.
    async fn refresh(&mut self) -> (IpAddr, bool);

    /// Last known address (the unspecified address before the first success)
    fn current(&self) -> IpAddr;

    /// The address family this provider discovers
    fn version(&self) -> IpVersion;
}
