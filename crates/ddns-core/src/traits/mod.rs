//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressLookup`]: Resolve one discovery source to an address
//! - [`AddressProvider`]: Discover the current address of one family, with failover
//! - [`DnsApi`]: Operate on DNS records via a provider API

pub mod address;
pub mod dns_api;

pub use address::{AddressLookup, AddressProvider, IpVersion};
pub use dns_api::{Credentials, DnsApi, DnsApiFactory, DomainRecord, RecordQuery};
