//! Idempotent record reconciliation
//!
//! [`auto_update`] makes the remote record named by `record` hold
//! `record.value`, creating it when the zone has no such record.
//!
//! ## Decision Flow
//!
//! ```text
//! cached id? ── yes ──▶ update by id ──▶ ok / duplicate ──▶ done
//!     │                      │
//!     │                      ├── stale id ──▶ forget id ──┐
//!     │                      └── other error ──▶ fail     │
//!     no ◀────────────────────────────────────────────────┘
//!     │
//!     ▼
//! query RR + type ──▶ found ──▶ update under its id (duplicate is ok) ──▶ adopt
//!                 └─▶ none  ──▶ add ──▶ adopt
//! ```
//!
//! A stale id is re-resolved at most once per call.

use tracing::debug;

use crate::error::{ApiError, Error, Result};
use crate::traits::{DnsApi, DomainRecord, RecordQuery};

/// Reconcile `record` against `api`
///
/// On success `record.record_id` is set to the remote identifier.
///
/// # Errors
///
/// Any provider error other than `DomainRecordDuplicate` (and
/// `DomainRecordNotBelongToUser` on the cached-id path) is returned
/// unchanged.
pub async fn auto_update<A>(api: &A, record: &mut DomainRecord) -> Result<()>
where
    A: DnsApi + ?Sized,
{
    if record.record_id.is_some() {
        match api.update(record).await {
            Ok(()) => return Ok(()),
            Err(e) if is_duplicate(&e) => return Ok(()),
            Err(e) if is_stale_reference(&e) => {
                debug!(
                    record = %record.fqdn(),
                    record_id = ?record.record_id,
                    "Cached record id is stale, resolving again"
                );
                record.record_id = None;
            }
            Err(e) => return Err(e),
        }
    }

    let query = RecordQuery::new()
        .rr(record.rr.as_str())
        .record_type(record.record_type.as_str());
    let existing = api
        .query(&query)
        .await?
        .into_iter()
        .find(|remote| remote.rr == record.rr && remote.record_type == record.record_type);

    match existing {
        Some(remote) => {
            let mut wanted = record.clone();
            wanted.record_id = remote.record_id.clone();
            match api.update(&wanted).await {
                Ok(()) => {}
                Err(e) if is_duplicate(&e) => {}
                Err(e) => return Err(e),
            }
            record.adopt(&remote);
        }
        None => {
            let created = api.add(record).await?;
            record.adopt(&created);
        }
    }

    Ok(())
}

fn is_duplicate(error: &Error) -> bool {
    error.as_api().is_some_and(ApiError::is_duplicate)
}

fn is_stale_reference(error: &Error) -> bool {
    error.as_api().is_some_and(ApiError::is_stale_reference)
}
