//! Configuration types for the DDNS system
//!
//! The configuration file is JSON with PascalCase keys:
//!
//! ```json
//! {
//!     "AccessKeyId": "LTAI...",
//!     "AccessKeySecret": "...",
//!     "DomainName": "example.com",
//!     "LogFile": "/var/log/ddns.log",
//!     "LogLevel": "info",
//!     "CheckInterval": 10,
//!     "RetryInterval": 30,
//!     "DomainList": [
//!         { "RR": "home", "Type": "A", "TTL": 600 },
//!         { "RR": "nas", "Type": "AAAA", "TTL": 600, "Network": "2001:db8::1234/64" }
//!     ]
//! }
//! ```
//!
//! Each `DomainList` entry inherits credentials and domain name from the
//! top level unless it sets its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::subnet::Subnet;
use crate::traits::{Credentials, DomainRecord, IpVersion};

/// Provider used when the configuration does not name one
pub const DEFAULT_PROVIDER: &str = "memory";

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DdnsConfig {
    /// Default access key id for every binding
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Default access key secret for every binding
    #[serde(default, skip_serializing)]
    pub access_key_secret: Option<String>,

    /// Default zone for every binding
    #[serde(default)]
    pub domain_name: Option<String>,

    /// Log sink; stdout when unset
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub log_level: Option<LogLevel>,

    /// Seconds between two address checks
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Seconds before a failed update is retried, 0 disables retries
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,

    /// Registered DNS provider name
    #[serde(default)]
    pub provider: Option<String>,

    /// Provider API endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,

    /// IPv4 discovery URLs, replaces the built-in pool when non-empty
    #[serde(default, rename = "IPv4Providers")]
    pub ipv4_providers: Vec<String>,

    /// IPv6 discovery URLs or probe anchors, replaces the built-in pool when non-empty
    #[serde(default, rename = "IPv6Providers")]
    pub ipv6_providers: Vec<String>,

    /// Dynamic records to maintain
    #[serde(default)]
    pub domain_list: Vec<DomainEntry>,
}

impl DdnsConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            access_key_id: None,
            access_key_secret: None,
            domain_name: None,
            log_file: None,
            log_level: None,
            check_interval: default_check_interval(),
            retry_interval: default_retry_interval(),
            provider: None,
            endpoint: None,
            ipv4_providers: Vec::new(),
            ipv6_providers: Vec::new(),
            domain_list: Vec::new(),
        }
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to open dynamic domain name configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&data)
    }

    /// Parse a configuration from JSON text
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Validate the process-wide settings
    ///
    /// Individual bindings are validated separately by
    /// [`DomainEntry::resolve`] so one bad entry never rejects the others.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval == 0 {
            return Err(Error::config("CheckInterval must be > 0"));
        }
        if self.provider_name().is_empty() {
            return Err(Error::config("Provider cannot be empty"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Add a binding (builder style)
    pub fn with_domain(mut self, entry: DomainEntry) -> Self {
        self.domain_list.push(entry);
        self
    }
}

impl Default for DdnsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_check_interval() -> u64 {
    10
}

fn default_retry_interval() -> u64 {
    30
}

/// One `DomainList` entry as written in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainEntry {
    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing)]
    pub access_key_secret: Option<String>,

    #[serde(default)]
    pub domain_name: Option<String>,

    #[serde(default, rename = "RR")]
    pub rr: Option<String>,

    #[serde(default, rename = "Type")]
    pub record_type: Option<String>,

    #[serde(default, rename = "TTL")]
    pub ttl: Option<u64>,

    /// CIDR whose network bits replace the discovered prefix
    #[serde(default)]
    pub network: Option<String>,
}

impl DomainEntry {
    /// Create an entry for `rr` with the given record type
    pub fn new(rr: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            rr: Some(rr.into()),
            record_type: Some(record_type.to_string()),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
        self.domain_name = Some(domain_name.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.access_key_secret = Some(access_key_secret.into());
        self
    }

    /// Apply inherited defaults and validate
    ///
    /// Credentials are inherited as a pair: unless both the id and the
    /// secret are set on the entry, both come from `defaults`.
    ///
    /// # Errors
    ///
    /// - any of access key id, access key secret, domain name or RR empty
    /// - record type other than `A` / `AAAA`
    /// - `Network` not in CIDR notation, or of the other address family
    pub fn resolve(&self, defaults: &DdnsConfig) -> Result<DomainBinding> {
        let (access_key_id, access_key_secret) =
            if non_empty(&self.access_key_id).is_some() && non_empty(&self.access_key_secret).is_some() {
                (&self.access_key_id, &self.access_key_secret)
            } else {
                (&defaults.access_key_id, &defaults.access_key_secret)
            };
        let domain_name = non_empty(&self.domain_name).or(non_empty(&defaults.domain_name));

        let access_key_id = non_empty(access_key_id)
            .ok_or_else(|| Error::config("AccessKeyId cannot be empty"))?;
        let access_key_secret = non_empty(access_key_secret)
            .ok_or_else(|| Error::config("AccessKeySecret cannot be empty"))?;
        let domain_name = domain_name.ok_or_else(|| Error::config("DomainName cannot be empty"))?;
        let rr = non_empty(&self.rr).ok_or_else(|| Error::config("RR cannot be empty"))?;
        let record_type: RecordType = self
            .record_type
            .as_deref()
            .unwrap_or_default()
            .parse()?;

        let subnet = match non_empty(&self.network) {
            Some(network) => {
                let subnet: Subnet = network.parse().map_err(|_| {
                    Error::config(format!(
                        "the network address configuration is illegal: \"{}\"",
                        network
                    ))
                })?;
                if subnet.version() != record_type.version() {
                    return Err(Error::config(format!(
                        "network {} cannot be used with a {} record",
                        subnet, record_type
                    )));
                }
                Some(subnet)
            }
            None => None,
        };

        Ok(DomainBinding {
            credentials: Credentials {
                access_key_id: access_key_id.to_string(),
                access_key_secret: access_key_secret.to_string(),
                domain_name: domain_name.to_string(),
                endpoint: defaults.endpoint.clone(),
            },
            rr: rr.to_string(),
            record_type,
            ttl: self.ttl,
            subnet,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A validated dynamic record binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainBinding {
    pub credentials: Credentials,
    pub rr: String,
    pub record_type: RecordType,
    pub ttl: Option<u64>,
    pub subnet: Option<Subnet>,
}

impl DomainBinding {
    pub fn domain_name(&self) -> &str {
        &self.credentials.domain_name
    }

    /// Fully qualified record name
    pub fn fqdn(&self) -> String {
        self.record_template().fqdn()
    }

    /// The record to reconcile, without content
    pub fn record_template(&self) -> DomainRecord {
        DomainRecord::new(self.domain_name(), &self.rr, self.record_type.as_str()).with_ttl(self.ttl)
    }

    /// Address to publish for a discovered address
    pub fn publish_value(&self, discovered: IpAddr) -> IpAddr {
        crate::subnet::compose(discovered, self.subnet.as_ref())
    }
}

/// Dynamic record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Address family feeding this record type
    pub fn version(&self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            _ => Err(Error::config("domain name record type must be 'A' or 'AAAA'")),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    /// Equivalent `tracing` filter directive
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            _ => Err(Error::config(format!(
                "'{}' is not a valid log level (debug, info, warning, error, fatal)",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> DdnsConfig {
        DdnsConfig {
            access_key_id: Some("global-id".to_string()),
            access_key_secret: Some("global-secret".to_string()),
            domain_name: Some("example.com".to_string()),
            ..DdnsConfig::new()
        }
    }

    #[test]
    fn file_defaults_apply() {
        let config = DdnsConfig::from_json(r#"{ "DomainList": [] }"#).unwrap();
        assert_eq!(config.check_interval, 10);
        assert_eq!(config.retry_interval, 30);
        assert_eq!(config.provider_name(), DEFAULT_PROVIDER);
        assert!(config.log_level.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_file_parses() {
        let config = DdnsConfig::from_json(
            r#"{
                "AccessKeyId": "id",
                "AccessKeySecret": "secret",
                "DomainName": "example.com",
                "LogFile": "/tmp/ddns.log",
                "LogLevel": "warning",
                "CheckInterval": 60,
                "RetryInterval": 0,
                "IPv6Providers": ["https://v6.ident.me"],
                "DomainList": [
                    { "RR": "home", "Type": "A", "TTL": 600 },
                    { "AccessKeyId": "other", "AccessKeySecret": "pw", "DomainName": "example.org",
                      "RR": "nas", "Type": "AAAA", "Network": "2001:db8::1/64" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.log_level, Some(LogLevel::Warning));
        assert_eq!(config.check_interval(), Duration::from_secs(60));
        assert!(config.retry_interval().is_zero());
        assert_eq!(config.ipv6_providers, vec!["https://v6.ident.me".to_string()]);
        assert_eq!(config.domain_list.len(), 2);

        let nas = config.domain_list[1].resolve(&config).unwrap();
        assert_eq!(nas.credentials.access_key_id, "other");
        assert_eq!(nas.fqdn(), "nas.example.org");
        assert_eq!(nas.subnet.map(|s| s.prefix_len()), Some(64));
    }

    #[test]
    fn bad_log_level_is_rejected() {
        assert!(DdnsConfig::from_json(r#"{ "LogLevel": "loud" }"#).is_err());
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(LogLevel::Fatal.as_filter(), "error");
    }

    #[test]
    fn zero_check_interval_is_rejected() {
        let config = DdnsConfig {
            check_interval: 0,
            ..DdnsConfig::new()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn entry_inherits_globals() {
        let binding = DomainEntry::new("home", RecordType::A)
            .with_ttl(600)
            .resolve(&defaults())
            .unwrap();

        assert_eq!(binding.credentials.access_key_id, "global-id");
        assert_eq!(binding.credentials.access_key_secret, "global-secret");
        assert_eq!(binding.domain_name(), "example.com");
        assert_eq!(binding.record_type, RecordType::A);
        assert_eq!(binding.ttl, Some(600));
        assert!(binding.subnet.is_none());
    }

    #[test]
    fn credentials_are_inherited_as_a_pair() {
        let mut entry = DomainEntry::new("home", RecordType::A);
        entry.access_key_id = Some("own-id".to_string());

        let binding = entry.resolve(&defaults()).unwrap();
        assert_eq!(binding.credentials.access_key_id, "global-id");

        let binding = DomainEntry::new("home", RecordType::A)
            .with_credentials("own-id", "own-secret")
            .resolve(&defaults())
            .unwrap();
        assert_eq!(binding.credentials.access_key_id, "own-id");
        assert_eq!(binding.credentials.access_key_secret, "own-secret");
    }

    #[test]
    fn invalid_entries_are_rejected() {
        let no_credentials = DdnsConfig {
            domain_name: Some("example.com".to_string()),
            ..DdnsConfig::new()
        };
        assert!(DomainEntry::new("home", RecordType::A).resolve(&no_credentials).is_err());

        let mut no_domain = defaults();
        no_domain.domain_name = Some("  ".to_string());
        assert!(DomainEntry::new("home", RecordType::A).resolve(&no_domain).is_err());

        assert!(DomainEntry::new("", RecordType::A).resolve(&defaults()).is_err());

        let mut bad_type = DomainEntry::new("home", RecordType::A);
        bad_type.record_type = Some("CNAME".to_string());
        assert!(bad_type.resolve(&defaults()).is_err());

        let mut no_type = DomainEntry::new("home", RecordType::A);
        no_type.record_type = None;
        assert!(no_type.resolve(&defaults()).is_err());
    }

    #[test]
    fn malformed_network_rejects_binding() {
        let entry = DomainEntry::new("nas", RecordType::Aaaa).with_network("2001:db8::1");
        let err = entry.resolve(&defaults()).unwrap_err();
        assert!(err.to_string().contains("network address configuration is illegal"));

        let mismatched = DomainEntry::new("home", RecordType::A).with_network("2001:db8::/64");
        assert!(mismatched.resolve(&defaults()).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddns.json");
        std::fs::write(&path, r#"{ "CheckInterval": 5, "DomainList": [ { "RR": "@", "Type": "A" } ] }"#)
            .unwrap();

        let config = DdnsConfig::load(&path).unwrap();
        assert_eq!(config.check_interval, 5);
        assert_eq!(config.domain_list[0].rr.as_deref(), Some("@"));

        assert!(DdnsConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn publish_value_applies_subnet() {
        let binding = DomainEntry::new("nas", RecordType::Aaaa)
            .with_network("2001:db8::/64")
            .resolve(&defaults())
            .unwrap();

        let discovered: IpAddr = "240e:3b7::aa:bb:cc:dd".parse().unwrap();
        assert_eq!(
            binding.publish_value(discovered),
            "2001:db8::aa:bb:cc:dd".parse::<IpAddr>().unwrap()
        );
        assert_eq!(binding.record_template().record_type, "AAAA");
    }
}
