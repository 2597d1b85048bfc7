//! Plugin-based provider registry
//!
//! The registry allows DNS provider APIs to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! // Create a registry with the built-in providers
//! let registry = ProviderRegistry::with_builtins();
//!
//! // Register providers
//! registry.register_provider("alidns", Box::new(AlidnsFactory));
//!
//! // Create a client for one binding
//! let api = registry.create_api("alidns", &binding.credentials)?;
//! ```
//!
//! ## Registration
//!
//! Provider crates should expose a registration function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("alidns", Box::new(AlidnsFactory));
//! }
//! ```

use crate::api::MemoryDnsApiFactory;
use crate::error::{Error, Result};
use crate::traits::{Credentials, DnsApi, DnsApiFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Provider registry for plugin-based DNS API creation
///
/// The registry maintains a map of provider names to factory objects,
/// allowing dynamic instantiation of clients based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS API factories
    providers: RwLock<HashMap<String, Box<dyn DnsApiFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the providers shipped in this crate
    ///
    /// - `memory`: [`crate::api::MemoryDnsApi`]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_provider("memory", Box::new(MemoryDnsApiFactory::new()));
        registry
    }

    /// Register a DNS API factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider name as used in the `Provider` config key
    /// - `factory`: Factory object for creating clients
    ///
    /// Registering an existing name replaces the previous factory.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsApiFactory>) {
        let name = name.into();
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.insert(name, factory);
    }

    /// Create a DNS API client
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `name` is not registered
    /// - Whatever the factory returns for unusable credentials
    pub fn create_api(&self, name: &str, credentials: &Credentials) -> Result<Box<dyn DnsApi>> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());

        let factory = providers
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", name)))?;

        factory.create(credentials)
    }

    /// List all registered provider names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider name is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        providers.contains_key(name)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .finish()
    }
}
