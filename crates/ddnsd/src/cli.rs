//! Command line interface
//!
//! Two ways to configure the daemon:
//!
//! - `--conf ddns.json`: bindings come from the file. Flags and the
//!   `ALIDNS_*` environment variables only fill in what the file leaves
//!   empty (credentials, domain, log settings, endpoint).
//! - no `--conf`: a single binding is built from `--rr`, `--type`, `--ttl`
//!   and `--network`.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;

use ddns_core::{DdnsConfig, DomainEntry, LogLevel, RecordType};

/// Dynamic DNS daemon: keeps DNS records pointed at this host's public address.
#[derive(Parser, Debug, Clone)]
#[command(name = "ddnsd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(long)]
    pub conf: Option<PathBuf>,

    /// Access key id
    #[arg(long, env = "ALIDNS_ACCESSKEYID", hide_env_values = true)]
    pub key: Option<String>,

    /// Access key secret
    #[arg(long, env = "ALIDNS_ACCESSKEYSECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Domain name (zone)
    #[arg(long, env = "ALIDNS_DOMAINNAME")]
    pub domain: Option<String>,

    /// Provider API endpoint
    #[arg(long, env = "ALIDNS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// DNS provider
    #[arg(long)]
    pub provider: Option<String>,

    /// RR (resource record), `@` for the zone apex
    #[arg(long, default_value = "@")]
    pub rr: String,

    /// Record type, 'A' or 'AAAA'
    #[arg(long = "type")]
    pub record_type: Option<String>,

    /// TTL of the record in seconds
    #[arg(long, default_value_t = 600)]
    pub ttl: u64,

    /// Network prefix to publish under, in CIDR notation (e.g. 2001:db8::/64)
    #[arg(long)]
    pub network: Option<String>,

    /// Seconds between address checks
    #[arg(long, alias = "chkIntvl", default_value_t = 10)]
    pub check_interval: u64,

    /// Seconds before a failed update is retried, 0 disables retries
    #[arg(long, alias = "retryIntvl", default_value_t = 30)]
    pub retry_interval: u64,

    /// Log file, stdout when unset
    #[arg(long)]
    pub log: Option<String>,

    /// Log level [debug, info, warning, error, fatal]
    #[arg(long, alias = "loglvl", default_value = "info")]
    pub log_level: LogLevel,
}

impl Cli {
    /// Build the daemon configuration
    pub fn into_config(self) -> Result<DdnsConfig> {
        let mut config = match &self.conf {
            Some(path) => DdnsConfig::load(path)
                .with_context(|| format!("failed to load configuration file {}", path.display()))?,
            None => self.single_binding()?,
        };

        if config.log_level.is_none() {
            config.log_level = Some(self.log_level);
        }
        config.log_file = or_default(config.log_file, self.log);

        if blank(&config.access_key_id) || blank(&config.access_key_secret) {
            config.access_key_id = self.key;
            config.access_key_secret = self.secret;
        }
        config.domain_name = or_default(config.domain_name, self.domain);
        config.endpoint = or_default(config.endpoint, self.endpoint);
        if self.provider.is_some() {
            config.provider = self.provider;
        }

        config.validate()?;
        Ok(config)
    }

    fn single_binding(&self) -> Result<DdnsConfig> {
        if self.rr.trim().is_empty() {
            bail!("RR must be specified");
        }
        let record_type: RecordType = self.record_type.as_deref().unwrap_or_default().parse()?;

        let mut entry = DomainEntry::new(self.rr.trim(), record_type).with_ttl(self.ttl);
        if let Some(network) = self.network.as_deref().filter(|n| !n.is_empty()) {
            entry = entry.with_network(network);
        }

        Ok(DdnsConfig {
            check_interval: self.check_interval,
            retry_interval: self.retry_interval,
            ..DdnsConfig::new()
        }
        .with_domain(entry))
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn or_default(value: Option<String>, fallback: Option<String>) -> Option<String> {
    if blank(&value) { fallback } else { value }
}
