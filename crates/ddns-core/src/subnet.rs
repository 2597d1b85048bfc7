//! Subnet composition
//!
//! A [`Subnet`] pins the network part of a published address while the host
//! part follows the discovered address:
//!
//! ```text
//! result[i] = (discovered[i] & !mask[i]) | (network[i] & mask[i])
//! ```
//!
//! With `Network = "2001:db8::/64"` and a discovered address of
//! `fe80::1234:5678:9abc:def0` the published value is
//! `2001:db8::1234:5678:9abc:def0`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};
use crate::traits::IpVersion;

/// A network address and prefix length parsed from CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: IpAddr,
    prefix_len: u8,
}

impl Subnet {
    /// Create a subnet, masking off the host bits of `addr`
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(Error::invalid_input(format!(
                "prefix length {} exceeds {} for {}",
                prefix_len, max, addr
            )));
        }

        let network = match addr {
            IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(
                u32::from(v4) & v4_mask(prefix_len),
            )),
            IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(
                u128::from(v6) & v6_mask(prefix_len),
            )),
        };

        Ok(Self {
            network,
            prefix_len,
        })
    }

    /// Network address (host bits cleared)
    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn version(&self) -> IpVersion {
        IpVersion::of(&self.network)
    }

    /// Netmask as an address
    pub fn mask(&self) -> IpAddr {
        match self.network {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(v4_mask(self.prefix_len))),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(v6_mask(self.prefix_len))),
        }
    }

    /// Combine the network bits of this subnet with the host bits of `discovered`
    ///
    /// Returns `None` when `discovered` belongs to the other address family.
    pub fn compose(&self, discovered: IpAddr) -> Option<IpAddr> {
        match (discovered, self.network, self.mask()) {
            (IpAddr::V4(ip), IpAddr::V4(net), IpAddr::V4(mask)) => Some(IpAddr::V4(
                merge(ip.octets(), net.octets(), mask.octets()).into(),
            )),
            (IpAddr::V6(ip), IpAddr::V6(net), IpAddr::V6(mask)) => Some(IpAddr::V6(
                merge(ip.octets(), net.octets(), mask.octets()).into(),
            )),
            _ => None,
        }
    }
}

impl FromStr for Subnet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::invalid_input(format!("'{}' is not in CIDR notation", s)))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid network address in '{}'", s)))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| Error::invalid_input(format!("invalid prefix length in '{}'", s)))?;

        Self::new(addr, prefix_len)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Address to publish for `discovered` under an optional subnet
///
/// Without a subnet, or when the families differ, the discovered address is
/// published unchanged.
pub fn compose(discovered: IpAddr, subnet: Option<&Subnet>) -> IpAddr {
    let Some(subnet) = subnet else {
        return discovered;
    };
    subnet.compose(discovered).unwrap_or_else(|| {
        warn!(%discovered, %subnet, "Address family differs from the subnet, publishing as discovered");
        discovered
    })
}

fn merge<const N: usize>(discovered: [u8; N], network: [u8; N], mask: [u8; N]) -> [u8; N] {
    std::array::from_fn(|i| (discovered[i] & !mask[i]) | (network[i] & mask[i]))
}

fn v4_mask(prefix_len: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0)
}

fn v6_mask(prefix_len: u8) -> u128 {
    u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0)
}
