//! Test doubles and common utilities for architecture contract tests
//!
//! The doubles wrap or imitate real components and count what the code
//! under test does to them, so contracts can be asserted as call counts.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{DdnsConfig, DomainBinding, DomainEntry, RecordType};
use ddns_core::engine::reconcile;
use ddns_core::error::{ApiError, Error, Result};
use ddns_core::traits::{
    AddressLookup, AddressProvider, Credentials, DnsApi, DnsApiFactory, DomainRecord, IpVersion,
    RecordQuery,
};
use ddns_core::{Ipv4Provider, Ipv6Provider, MemoryDnsApi};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Configuration with credentials and zone set, no bindings
pub fn base_config() -> DdnsConfig {
    DdnsConfig {
        access_key_id: Some("test-id".to_string()),
        access_key_secret: Some("test-secret".to_string()),
        domain_name: Some("example.com".to_string()),
        ..DdnsConfig::new()
    }
}

/// Resolve a binding for `rr` in example.com
pub fn binding(rr: &str, record_type: RecordType) -> DomainBinding {
    DomainEntry::new(rr, record_type)
        .with_ttl(600)
        .resolve(&base_config())
        .unwrap()
}

/// Resolve a binding published under `network`
pub fn subnet_binding(rr: &str, record_type: RecordType, network: &str) -> DomainBinding {
    DomainEntry::new(rr, record_type)
        .with_ttl(600)
        .with_network(network)
        .resolve(&base_config())
        .unwrap()
}

#[derive(Default)]
struct Counters {
    auto_updates: AtomicUsize,
    queries: AtomicUsize,
    adds: AtomicUsize,
    updates: AtomicUsize,
    /// Errors returned by the next `auto_update` calls, in order
    failures: Mutex<VecDeque<ApiError>>,
    /// Time every `auto_update` call takes
    latency: Mutex<Option<Duration>>,
}

/// A DnsApi over an in-memory zone that counts calls
///
/// Clones share the zone and the counters, so a test can keep a handle
/// while the service owns another.
#[derive(Clone)]
pub struct CountingApi {
    inner: MemoryDnsApi,
    counters: Arc<Counters>,
}

impl CountingApi {
    pub fn new(domain_name: &str) -> Self {
        Self {
            inner: MemoryDnsApi::new(domain_name),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Make the next `auto_update` call fail with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.counters.failures.lock().unwrap().push_back(error);
    }

    /// Make every `auto_update` call take `latency`
    pub fn slow(&self, latency: Duration) {
        *self.counters.latency.lock().unwrap() = Some(latency);
    }

    /// Number of times auto_update() was called
    pub fn auto_update_count(&self) -> usize {
        self.counters.auto_updates.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.counters.queries.load(Ordering::SeqCst)
    }

    pub fn add_count(&self) -> usize {
        self.counters.adds.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.counters.updates.load(Ordering::SeqCst)
    }

    /// Successful add / update / delete calls on the zone
    pub fn mutations(&self) -> usize {
        self.inner.mutations()
    }

    pub async fn records(&self) -> Vec<DomainRecord> {
        self.inner.records().await
    }

    /// Values of all records named `rr`
    pub async fn values_of(&self, rr: &str) -> Vec<String> {
        self.records()
            .await
            .into_iter()
            .filter(|record| record.rr == rr)
            .map(|record| record.value)
            .collect()
    }
}

#[async_trait]
impl DnsApi for CountingApi {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<DomainRecord>> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(query).await
    }

    async fn retrieve(&self, record_id: &str) -> Result<DomainRecord> {
        self.inner.retrieve(record_id).await
    }

    async fn add(&self, record: &DomainRecord) -> Result<DomainRecord> {
        self.counters.adds.fetch_add(1, Ordering::SeqCst);
        self.inner.add(record).await
    }

    async fn update(&self, record: &DomainRecord) -> Result<()> {
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(record).await
    }

    async fn delete(&self, record_id: &str) -> Result<()> {
        self.inner.delete(record_id).await
    }

    fn domain_name(&self) -> &str {
        self.inner.domain_name()
    }

    fn provider_name(&self) -> &'static str {
        "counting"
    }

    async fn auto_update(&self, record: &mut DomainRecord) -> Result<()> {
        self.counters.auto_updates.fetch_add(1, Ordering::SeqCst);
        let latency = *self.counters.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let failure = self.counters.failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(Error::Api(error));
        }
        reconcile::auto_update(self, record).await
    }
}

/// Factory handing out one shared CountingApi
pub struct CountingFactory(pub CountingApi);

impl DnsApiFactory for CountingFactory {
    fn create(&self, _credentials: &Credentials) -> Result<Box<dyn DnsApi>> {
        Ok(Box::new(self.0.clone()))
    }
}

/// What a scripted source answers
#[derive(Debug, Clone)]
pub enum Answer {
    Address(IpAddr),
    Fail,
}

/// An AddressLookup answering from a table
///
/// Unknown sources fail. Clones share the table and the call log.
#[derive(Clone, Default)]
pub struct ScriptedLookup {
    answers: Arc<Mutex<HashMap<String, Answer>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, source: &str, answer: Answer) {
        self.answers
            .lock()
            .unwrap()
            .insert(source.to_string(), answer);
    }

    /// Sources queried so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl AddressLookup for ScriptedLookup {
    async fn lookup(&self, source: &str) -> Result<IpAddr> {
        self.calls.lock().unwrap().push(source.to_string());
        let answer = self.answers.lock().unwrap().get(source).cloned();
        match answer {
            Some(Answer::Address(ip)) => Ok(ip),
            Some(Answer::Fail) | None => Err(Error::discovery(format!("{} failed", source))),
        }
    }
}

/// IPv4 provider over one scripted source answering `address`
pub fn steady_ipv4(address: &str) -> (Ipv4Provider, ScriptedLookup) {
    let lookup = ScriptedLookup::new();
    lookup.set("http://v4.test/", Answer::Address(ip(address)));
    let provider = Ipv4Provider::new(vec!["http://v4.test/".to_string()], Box::new(lookup.clone()));
    (provider, lookup)
}

/// IPv6 provider whose every source fails
pub fn silent_ipv6() -> Ipv6Provider {
    Ipv6Provider::new(
        vec!["http://v6.test/".to_string()],
        Box::new(ScriptedLookup::new()),
        Box::new(ScriptedLookup::new()),
    )
}

/// An AddressProvider that never sees an address
pub struct NoAddress(pub IpVersion);

#[async_trait]
impl AddressProvider for NoAddress {
    async fn refresh(&mut self) -> (IpAddr, bool) {
        (self.0.unspecified(), false)
    }

    fn current(&self) -> IpAddr {
        self.0.unspecified()
    }

    fn version(&self) -> IpVersion {
        self.0
    }
}
