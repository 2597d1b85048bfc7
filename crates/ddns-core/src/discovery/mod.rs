//! Address providers with rotating source failover
//!
//! Each provider keeps an ordered queue of discovery sources. A refresh
//! walks the queue from the head; a failing source is moved to the tail so
//! the next refresh starts with the source that answered last.
//!
//! ```text
//! [a, b, c, d]  a fails, b fails, c answers  →  [c, d, a, b]
//! ```
//!
//! The lookups themselves live in plugin crates (`ddns-ip-http`,
//! `ddns-ip-probe`) and are injected as [`AddressLookup`] objects.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::IpAddr;
use tracing::{debug, info, warn};

use crate::traits::{AddressLookup, AddressProvider, IpVersion};

/// Built-in IPv4 discovery endpoints
pub const DEFAULT_IPV4_SOURCES: &[&str] = &[
    "https://myip.ipip.net",
    "https://ip.tool.lu",
    "https://myip.dnsomatic.com",
    "https://api4.ipify.org",
    "https://ipv4.jsonip.com",
];

/// Built-in IPv6 probe anchors
///
/// Public resolvers; no packet is sent to them, they only steer the
/// kernel's source address selection.
pub const DEFAULT_IPV6_SOURCES: &[&str] = &[
    "2400:3200::1",
    "2400:3200:baba::1",
    "2400:da00::6666",
    "240e:4c:4008::1",
    "240e:4c:4808::1",
];

/// Rotating queue of sources plus the last known address
#[derive(Debug, Clone)]
struct SourcePool {
    version: IpVersion,
    sources: VecDeque<String>,
    current: IpAddr,
}

impl SourcePool {
    fn new(version: IpVersion, sources: Vec<String>, defaults: &[&str]) -> Self {
        let sources: VecDeque<String> = if sources.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            sources.into()
        };

        Self {
            version,
            sources,
            current: version.unspecified(),
        }
    }

    async fn refresh<'a, F>(&mut self, route: F) -> (IpAddr, bool)
    where
        F: Fn(&str) -> &'a dyn AddressLookup,
    {
        for _ in 0..self.sources.len() {
            let Some(source) = self.sources.front() else {
                break;
            };

            let result = match route(source).lookup(source).await {
                Ok(ip) if IpVersion::of(&ip) == self.version => Ok(ip),
                Ok(ip) => Err(format!("returned {} address {}", IpVersion::of(&ip), ip)),
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(ip) if ip == self.current => {
                    debug!(%source, %ip, "{} address unchanged", self.version);
                    return (ip, false);
                }
                Ok(ip) => {
                    info!(%source, %ip, previous = %self.current, "{} address discovered", self.version);
                    self.current = ip;
                    return (ip, true);
                }
                Err(reason) => {
                    warn!(%source, "{} discovery failed: {}", self.version, reason);
                    self.sources.rotate_left(1);
                }
            }
        }

        warn!("No {} source answered, keeping {}", self.version, self.current);
        (self.current, false)
    }
}

/// IPv4 provider: every source is an HTTP endpoint
pub struct Ipv4Provider {
    pool: SourcePool,
    http: Box<dyn AddressLookup>,
}

impl Ipv4Provider {
    /// Create a provider over `sources`, or the built-in pool when empty
    pub fn new(sources: Vec<String>, http: Box<dyn AddressLookup>) -> Self {
        Self {
            pool: SourcePool::new(IpVersion::V4, sources, DEFAULT_IPV4_SOURCES),
            http,
        }
    }

    /// Sources in the order the next refresh will try them
    pub fn sources(&self) -> Vec<String> {
        self.pool.sources.iter().cloned().collect()
    }
}

#[async_trait]
impl AddressProvider for Ipv4Provider {
    async fn refresh(&mut self) -> (IpAddr, bool) {
        let http = self.http.as_ref();
        self.pool.refresh(|_| http).await
    }

    fn current(&self) -> IpAddr {
        self.pool.current
    }

    fn version(&self) -> IpVersion {
        IpVersion::V4
    }
}

/// IPv6 provider
///
/// Sources starting with `http` are fetched over HTTP, anything else is an
/// address handed to the local socket probe.
pub struct Ipv6Provider {
    pool: SourcePool,
    http: Box<dyn AddressLookup>,
    probe: Box<dyn AddressLookup>,
}

impl Ipv6Provider {
    /// Create a provider over `sources`, or the built-in pool when empty
    pub fn new(
        sources: Vec<String>,
        http: Box<dyn AddressLookup>,
        probe: Box<dyn AddressLookup>,
    ) -> Self {
        Self {
            pool: SourcePool::new(IpVersion::V6, sources, DEFAULT_IPV6_SOURCES),
            http,
            probe,
        }
    }

    /// Sources in the order the next refresh will try them
    pub fn sources(&self) -> Vec<String> {
        self.pool.sources.iter().cloned().collect()
    }
}

#[async_trait]
impl AddressProvider for Ipv6Provider {
    async fn refresh(&mut self) -> (IpAddr, bool) {
        let http = self.http.as_ref();
        let probe = self.probe.as_ref();
        self.pool
            .refresh(|source| if source.starts_with("http") { http } else { probe })
            .await
    }

    fn current(&self) -> IpAddr {
        self.pool.current
    }

    fn version(&self) -> IpVersion {
        IpVersion::V6
    }
}

impl std::fmt::Debug for Ipv4Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv4Provider").field("pool", &self.pool).finish()
    }
}

impl std::fmt::Debug for Ipv6Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv6Provider").field("pool", &self.pool).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Answers from a fixed table, records every source asked
    #[derive(Clone, Default)]
    struct TableLookup {
        answers: Arc<Mutex<HashMap<String, IpAddr>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TableLookup {
        fn answer(&self, source: &str, ip: &str) {
            self.answers
                .lock()
                .unwrap()
                .insert(source.to_string(), ip.parse().unwrap());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AddressLookup for TableLookup {
        async fn lookup(&self, source: &str) -> Result<IpAddr, Error> {
            self.calls.lock().unwrap().push(source.to_string());
            self.answers
                .lock()
                .unwrap()
                .get(source)
                .copied()
                .ok_or_else(|| Error::discovery(format!("{} unreachable", source)))
        }
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_configuration_uses_builtin_pools() {
        let v4 = Ipv4Provider::new(Vec::new(), Box::new(TableLookup::default()));
        assert_eq!(v4.sources(), sources(DEFAULT_IPV4_SOURCES));
        assert!(v4.current().is_unspecified());

        let v6 = Ipv6Provider::new(
            Vec::new(),
            Box::new(TableLookup::default()),
            Box::new(TableLookup::default()),
        );
        assert_eq!(v6.sources(), sources(DEFAULT_IPV6_SOURCES));
        assert_eq!(v6.version(), IpVersion::V6);
    }

    #[tokio::test]
    async fn failing_sources_rotate_to_tail() {
        let lookup = TableLookup::default();
        lookup.answer("https://c", "203.0.113.5");
        let mut provider = Ipv4Provider::new(
            sources(&["https://a", "https://b", "https://c", "https://d"]),
            Box::new(lookup.clone()),
        );

        assert_eq!(provider.refresh().await, ("203.0.113.5".parse().unwrap(), true));
        assert_eq!(
            provider.sources(),
            sources(&["https://c", "https://d", "https://a", "https://b"])
        );
        assert_eq!(lookup.calls(), sources(&["https://a", "https://b", "https://c"]));
    }

    #[tokio::test]
    async fn changed_is_reported_once() {
        let lookup = TableLookup::default();
        lookup.answer("https://a", "203.0.113.5");
        let mut provider = Ipv4Provider::new(sources(&["https://a"]), Box::new(lookup.clone()));

        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(provider.refresh().await, (ip, true));
        assert_eq!(provider.refresh().await, (ip, false));

        lookup.answer("https://a", "203.0.113.9");
        let next: IpAddr = "203.0.113.9".parse().unwrap();
        assert_eq!(provider.refresh().await, (next, true));
        assert_eq!(provider.current(), next);
    }

    #[tokio::test]
    async fn all_sources_failing_keeps_last_address() {
        let lookup = TableLookup::default();
        lookup.answer("https://a", "203.0.113.5");
        let mut provider = Ipv4Provider::new(
            sources(&["https://a", "https://b"]),
            Box::new(lookup.clone()),
        );
        provider.refresh().await;

        lookup.answers.lock().unwrap().clear();
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(provider.refresh().await, (ip, false));
        assert_eq!(provider.sources(), sources(&["https://a", "https://b"]));
    }

    #[tokio::test]
    async fn wrong_family_answer_is_a_failure() {
        let lookup = TableLookup::default();
        lookup.answer("https://a", "2001:db8::1");
        lookup.answer("https://b", "198.51.100.1");
        let mut provider = Ipv4Provider::new(
            sources(&["https://a", "https://b"]),
            Box::new(lookup.clone()),
        );

        assert_eq!(provider.refresh().await, ("198.51.100.1".parse().unwrap(), true));
        assert_eq!(provider.sources(), sources(&["https://b", "https://a"]));
    }

    #[tokio::test]
    async fn ipv6_routes_by_source_kind() {
        let http = TableLookup::default();
        let probe = TableLookup::default();
        probe.answer("2400:3200::1", "240e:3b7::1");
        let mut provider = Ipv6Provider::new(
            sources(&["https://v6.ident.me", "2400:3200::1"]),
            Box::new(http.clone()),
            Box::new(probe.clone()),
        );

        assert_eq!(provider.refresh().await, ("240e:3b7::1".parse().unwrap(), true));
        assert_eq!(http.calls(), sources(&["https://v6.ident.me"]));
        assert_eq!(probe.calls(), sources(&["2400:3200::1"]));
    }
}
