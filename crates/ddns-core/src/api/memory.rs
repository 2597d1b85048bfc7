// # Memory DNS API
//
// In-memory implementation of DnsApi.
//
// ## Purpose
//
// Answers like a remote provider without leaving the process: dry runs of
// a configuration, and the reconciliation tests.
//
// ## Provider Behavior
//
// - Record ids are assigned sequentially, starting at 1
// - Updating a record to its current content fails with `DomainRecordDuplicate`
// - Adding a record identical to an existing one fails with `DomainRecordDuplicate`
// - Unknown record ids fail with `DomainRecordNotBelongToUser`
// - All state is lost on restart

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::error::{ApiError, Error, Result};
use crate::traits::{Credentials, DnsApi, DnsApiFactory, DomainRecord, RecordQuery};

#[derive(Debug, Default)]
struct Zone {
    records: RwLock<BTreeMap<u64, DomainRecord>>,
    next_id: AtomicU64,
    mutations: AtomicUsize,
}

/// In-memory DNS API for one zone
///
/// Clones share the same records.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::api::MemoryDnsApi;
/// use ddns_core::traits::{DnsApi, DomainRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let api = MemoryDnsApi::new("example.com");
///
///     let mut record = DomainRecord::new("example.com", "home", "A").with_value("203.0.113.5");
///     api.auto_update(&mut record).await?;
///
///     assert!(record.record_id.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDnsApi {
    domain_name: String,
    zone: Arc<Zone>,
}

impl MemoryDnsApi {
    /// Create an empty zone
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            zone: Arc::new(Zone::default()),
        }
    }

    /// Snapshot of all records, ordered by id
    pub async fn records(&self) -> Vec<DomainRecord> {
        self.zone.records.read().await.values().cloned().collect()
    }

    /// Number of successful add / update / delete calls
    pub fn mutations(&self) -> usize {
        self.zone.mutations.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> u64 {
        self.zone.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn mutated(&self) {
        self.zone.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn not_belong(record_id: &str) -> Error {
    Error::Api(ApiError::not_belong_to_user(format!(
        "the record {} does not belong to you",
        record_id
    )))
}

fn parse_id(record_id: &str) -> Result<u64> {
    record_id.parse().map_err(|_| not_belong(record_id))
}

fn same_content(stored: &DomainRecord, wanted: &DomainRecord) -> bool {
    stored.rr == wanted.rr
        && stored.record_type == wanted.record_type
        && stored.value == wanted.value
        && wanted.ttl.is_none_or(|ttl| stored.ttl == Some(ttl))
}

#[async_trait]
impl DnsApi for MemoryDnsApi {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<DomainRecord>> {
        let records = self.zone.records.read().await;
        Ok(records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }

    async fn retrieve(&self, record_id: &str) -> Result<DomainRecord> {
        let id = parse_id(record_id)?;
        let records = self.zone.records.read().await;
        records.get(&id).cloned().ok_or_else(|| not_belong(record_id))
    }

    async fn add(&self, record: &DomainRecord) -> Result<DomainRecord> {
        let mut records = self.zone.records.write().await;
        if records.values().any(|stored| same_content(stored, record)) {
            return Err(Error::Api(ApiError::duplicate("the DNS record already exists")));
        }

        let id = self.next_id();
        let stored = DomainRecord {
            record_id: Some(id.to_string()),
            domain_name: self.domain_name.clone(),
            line: record.line.clone().or_else(|| Some("default".to_string())),
            status: Some("ENABLE".to_string()),
            locked: Some(false),
            ..record.clone()
        };
        records.insert(id, stored.clone());
        self.mutated();

        Ok(stored)
    }

    async fn update(&self, record: &DomainRecord) -> Result<()> {
        let record_id = record
            .record_id
            .as_deref()
            .ok_or_else(|| Error::invalid_input("record has no RecordId"))?;
        let id = parse_id(record_id)?;

        let mut records = self.zone.records.write().await;
        let stored = records.get_mut(&id).ok_or_else(|| not_belong(record_id))?;

        if same_content(stored, record) {
            return Err(Error::Api(ApiError::duplicate("the DNS record already exists")));
        }

        stored.rr = record.rr.clone();
        stored.record_type = record.record_type.clone();
        stored.value = record.value.clone();
        if record.ttl.is_some() {
            stored.ttl = record.ttl;
        }
        if record.line.is_some() {
            stored.line = record.line.clone();
        }
        self.mutated();

        Ok(())
    }

    async fn delete(&self, record_id: &str) -> Result<()> {
        let id = parse_id(record_id)?;
        let mut records = self.zone.records.write().await;
        if records.remove(&id).is_none() {
            return Err(not_belong(record_id));
        }
        self.mutated();
        Ok(())
    }

    fn domain_name(&self) -> &str {
        &self.domain_name
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryDnsApi`]
///
/// Clients created for the same zone share their records, like two clients
/// of a remote provider would.
#[derive(Debug, Clone, Default)]
pub struct MemoryDnsApiFactory {
    zones: Arc<Mutex<HashMap<String, MemoryDnsApi>>>,
}

impl MemoryDnsApiFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared client for `domain_name`, created on first use
    pub fn zone(&self, domain_name: &str) -> MemoryDnsApi {
        let mut zones = self.zones.lock().unwrap_or_else(|e| e.into_inner());
        zones
            .entry(domain_name.to_string())
            .or_insert_with(|| MemoryDnsApi::new(domain_name))
            .clone()
    }
}

impl DnsApiFactory for MemoryDnsApiFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsApi>> {
        if credentials.domain_name.is_empty() {
            return Err(Error::config("DomainName cannot be empty"));
        }
        Ok(Box::new(self.zone(&credentials.domain_name)))
    }
}
