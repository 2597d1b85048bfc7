//! Built-in DNS API implementations
//!
//! - [`MemoryDnsApi`]: records held in process memory, registered as `"memory"`

pub mod memory;

pub use memory::{MemoryDnsApi, MemoryDnsApiFactory};
