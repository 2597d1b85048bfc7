// # ddns-core
//
// Core library for the dynamic DNS daemon.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressProvider**: Discovers the public IPv4 / IPv6 address with source failover
// - **Subnet**: Composes the published address from a configured network prefix
// - **DnsApi**: Trait for operating on DNS records via provider APIs
// - **UpdateService**: Keeps one record in line with the discovered address
// - **Daemon**: Check loop, fan-out to services and graceful drain
// - **ProviderRegistry**: Plugin-based registry for DNS provider APIs
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: Reconciliation converges; repeating it changes nothing

pub mod api;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod registry;
pub mod subnet;
pub mod traits;

// Re-export core types for convenience
pub use api::MemoryDnsApi;
pub use config::{DdnsConfig, DomainBinding, DomainEntry, LogLevel, RecordType};
pub use discovery::{Ipv4Provider, Ipv6Provider};
pub use engine::{Daemon, DaemonState, UpdateService};
pub use error::{ApiError, Error, Result};
pub use registry::ProviderRegistry;
pub use subnet::Subnet;
pub use traits::{AddressLookup, AddressProvider, DnsApi, DomainRecord, IpVersion};
