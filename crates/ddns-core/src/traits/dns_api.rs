// # DNS API Trait
//
// Defines the interface to a remote DNS provider that hosts the records the
// daemon reconciles.
//
// The provider is treated as an opaque remote service. Implementations map
// these operations onto their own wire protocol and report failures as
// `Error::Api` carrying the provider's error code, so that
// `engine::reconcile::auto_update` can tell "nothing changed" and "stale
// record id" apart from real failures.
//
// ## Implementations
//
// - In-memory: `api::MemoryDnsApi` (dry runs and tests)
// - Remote providers register a `DnsApiFactory` with the `ProviderRegistry`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A DNS record as seen by the provider
///
/// Field names follow the provider's JSON model (`RecordId`, `RR`, `Type`,
/// `TTL`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainRecord {
    /// Provider-assigned identifier, `None` until the record is resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// Zone the record lives in (e.g. "example.com")
    pub domain_name: String,

    /// Host label, `@` for the zone apex
    #[serde(rename = "RR")]
    pub rr: String,

    /// Record type ("A", "AAAA", ...)
    #[serde(rename = "Type")]
    pub record_type: String,

    /// Record content
    pub value: String,

    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Resolution line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,

    /// "ENABLE" / "DISABLE"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,

    /// MX priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl DomainRecord {
    /// Create a record template with no content yet
    pub fn new(
        domain_name: impl Into<String>,
        rr: impl Into<String>,
        record_type: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            rr: rr.into(),
            record_type: record_type.into(),
            ..Self::default()
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Option<u64>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the content
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Fully qualified name ("www.example.com", or the zone for `@`)
    pub fn fqdn(&self) -> String {
        if self.rr == "@" || self.rr.is_empty() {
            self.domain_name.clone()
        } else {
            format!("{}.{}", self.rr, self.domain_name)
        }
    }

    /// Take the identifier and provider-side metadata from `remote`
    ///
    /// Content fields (RR, type, value, TTL) are left untouched: they are
    /// what we want the remote record to look like.
    pub fn adopt(&mut self, remote: &DomainRecord) {
        self.record_id = remote.record_id.clone();
        if !remote.domain_name.is_empty() {
            self.domain_name = remote.domain_name.clone();
        }
        self.line = remote.line.clone();
        self.status = remote.status.clone();
        self.weight = remote.weight;
        self.locked = remote.locked;
        self.priority = remote.priority;
        self.remark = remote.remark.clone();
    }
}

/// Filter for [`DnsApi::query`]
///
/// `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// RR keyword
    pub rr: Option<String>,
    pub record_type: Option<String>,
    pub status: Option<String>,
    pub line: Option<String>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rr(mut self, rr: impl Into<String>) -> Self {
        self.rr = Some(rr.into());
        self
    }

    pub fn record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Whether `record` passes this filter
    pub fn matches(&self, record: &DomainRecord) -> bool {
        fn field(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }
        fn optional(filter: &Option<String>, value: &Option<String>) -> bool {
            filter
                .as_deref()
                .is_none_or(|f| value.as_deref() == Some(f))
        }

        field(&self.rr, &record.rr)
            && field(&self.record_type, &record.record_type)
            && optional(&self.status, &record.status)
            && optional(&self.line, &record.line)
    }
}

/// Credentials and zone used to build a [`DnsApi`]
///
/// # Security
///
/// The Debug implementation does NOT expose the access key secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    /// ⚠️ NEVER log this value
    pub access_key_secret: String,
    /// Zone the API operates on
    pub domain_name: String,
    /// Optional API endpoint override
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("domain_name", &self.domain_name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Trait for DNS provider API clients
///
/// One client is bound to one zone ([`DnsApi::domain_name`]).
///
/// # Trust Level: Untrusted
///
/// Clients execute single API calls and report the provider's answer. They
/// do not retry, do not cache record identifiers and do not decide whether
/// an update is needed: retry belongs to the `UpdateService` and the
/// identifier cache lives in the record passed to [`DnsApi::auto_update`].
///
/// # Errors
///
/// Provider-side failures must be returned as [`crate::Error::Api`] with the
/// provider's error code. In particular:
///
/// - [`crate::ApiError::DUPLICATE`] when an update or add would not change anything
/// - [`crate::ApiError::NOT_BELONG_TO_USER`] when a record id is unknown
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// List records of the zone matching `query`
    async fn query(&self, query: &RecordQuery) -> Result<Vec<DomainRecord>>;

    /// Fetch one record by identifier
    async fn retrieve(&self, record_id: &str) -> Result<DomainRecord>;

    /// Create a record and return it as stored by the provider
    async fn add(&self, record: &DomainRecord) -> Result<DomainRecord>;

    /// Overwrite the record identified by `record.record_id`
    async fn update(&self, record: &DomainRecord) -> Result<()>;

    /// Delete a record by identifier
    async fn delete(&self, record_id: &str) -> Result<()>;

    /// The zone this client operates on
    fn domain_name(&self) -> &str;

    /// Provider name for logging (e.g. "memory")
    fn provider_name(&self) -> &'static str;

    /// Update a record and read it back
    async fn update_and_retrieve(&self, record: &DomainRecord) -> Result<DomainRecord> {
        self.update(record).await?;
        let record_id = record
            .record_id
            .as_deref()
            .ok_or_else(|| crate::Error::invalid_input("record has no RecordId"))?;
        self.retrieve(record_id).await
    }

    /// Make the remote record match `record`, creating it if needed
    ///
    /// On success `record` carries the remote identifier and metadata, so
    /// the next call can update by identifier directly. See
    /// [`crate::engine::reconcile::auto_update`].
    async fn auto_update(&self, record: &mut DomainRecord) -> Result<()> {
        crate::engine::reconcile::auto_update(self, record).await
    }
}

/// Helper trait for constructing DNS API clients from credentials
pub trait DnsApiFactory: Send + Sync {
    /// Create a client bound to `credentials.domain_name`
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsApi>>;
}
