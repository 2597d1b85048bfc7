//! Per-binding update service
//!
//! An [`UpdateService`] owns one [`DomainBinding`] and its DNS API client.
//! It runs on its own task, receives discovered addresses over a bounded
//! channel and reconciles the remote record with each of them.
//!
//! ## Event Flow
//!
//! 1. Address received (from the daemon, or from the retry timer)
//! 2. Pending retry cancelled
//! 3. Published value composed from the binding's subnet
//! 4. `DnsApi::auto_update` called with the cached record
//! 5. On failure, one retry armed after `RetryInterval`

use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::DomainBinding;
use crate::engine::retry::RetryTimer;
use crate::error::{Error, Result};
use crate::traits::{DnsApi, DomainRecord, IpVersion};

/// Keeps one remote record pointed at the discovered address
///
/// # Threading
///
/// Service state is only touched by the task running [`UpdateService::run`].
/// Updates are serialized: the next address is not taken from the channel
/// before the current reconciliation has finished.
pub struct UpdateService {
    binding: DomainBinding,
    api: Box<dyn DnsApi>,

    /// Record sent to the provider, carries the cached id and remote metadata
    record: DomainRecord,

    retry_interval: Duration,
    retry: RetryTimer,
    span: Span,
}

impl UpdateService {
    /// Create a service for `binding`
    ///
    /// A zero `retry_interval` disables retries.
    pub fn new(binding: DomainBinding, api: Box<dyn DnsApi>, retry_interval: Duration) -> Self {
        let span = info_span!(
            "update_service",
            record = %binding.fqdn(),
            record_type = %binding.record_type,
            provider = api.provider_name(),
        );
        let record = binding.record_template();

        Self {
            binding,
            api,
            record,
            retry_interval,
            retry: RetryTimer::new(),
            span,
        }
    }

    pub fn binding(&self) -> &DomainBinding {
        &self.binding
    }

    /// Address family this service publishes
    pub fn version(&self) -> IpVersion {
        self.binding.record_type.version()
    }

    /// The record as last sent to the provider
    pub fn record(&self) -> &DomainRecord {
        &self.record
    }

    pub fn retry_pending(&self) -> bool {
        self.retry.is_armed()
    }

    /// When the pending retry fires, if one is armed
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry.deadline()
    }

    /// Reconcile the remote record with a newly discovered address
    ///
    /// Any pending retry is cancelled first. `None` and the unspecified
    /// address are ignored. On failure a retry with the same address is
    /// armed when the retry interval is non-zero, and the error is returned.
    pub async fn on_address_changed(&mut self, ip: Option<IpAddr>) -> Result<()> {
        let span = self.span.clone();
        self.handle_address(ip).instrument(span).await
    }

    async fn handle_address(&mut self, ip: Option<IpAddr>) -> Result<()> {
        self.retry.cancel();

        let Some(ip) = ip.filter(|ip| !ip.is_unspecified()) else {
            debug!("No address to publish");
            return Ok(());
        };

        if IpVersion::of(&ip) != self.version() {
            warn!(%ip, "Address family does not match the record type, ignoring");
            return Err(Error::invalid_input(format!(
                "{} address {} cannot be published in a {} record",
                IpVersion::of(&ip),
                ip,
                self.binding.record_type
            )));
        }

        let value = self.binding.publish_value(ip);
        self.record.value = value.to_string();
        self.record.ttl = self.binding.ttl;

        debug!(%value, record_id = ?self.record.record_id, "Updating record");
        match self.api.auto_update(&mut self.record).await {
            Ok(()) => {
                info!(
                    %value,
                    record_id = ?self.record.record_id,
                    "Updated dynamic record {}", self.binding.fqdn()
                );
                Ok(())
            }
            Err(e) => {
                match e.as_api() {
                    Some(api) => error!(
                        code = %api.code,
                        "Failed to update dynamic record {}: {}", self.binding.fqdn(), api.message
                    ),
                    None => error!("Failed to update dynamic record {}: {}", self.binding.fqdn(), e),
                }
                if !self.retry_interval.is_zero() {
                    debug!(retry_in = ?self.retry_interval, "Retry scheduled");
                    self.retry.arm(self.retry_interval, ip);
                }
                Err(e)
            }
        }
    }

    /// Process address events until shutdown
    ///
    /// Returns when `shutdown` turns `true` (or its sender is dropped), or
    /// when the event channel is closed. A pending retry is dropped on exit.
    pub async fn run(mut self, events: mpsc::Receiver<IpAddr>, shutdown: watch::Receiver<bool>) {
        let span = self.span.clone();
        self.run_loop(events, shutdown).instrument(span).await
    }

    async fn run_loop(&mut self, mut events: mpsc::Receiver<IpAddr>, mut shutdown: watch::Receiver<bool>) {
        debug!("Update service started");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                event = events.recv() => match event {
                    Some(ip) => {
                        let _ = self.handle_address(Some(ip)).await;
                    }
                    None => break,
                },

                ip = self.retry.expired() => {
                    info!(%ip, "Retrying failed update");
                    let _ = self.handle_address(Some(ip)).await;
                }
            }
        }

        self.close();
    }

    /// Stop the service: drop any pending retry
    pub fn close(&mut self) {
        if self.retry.is_armed() {
            debug!("Pending retry dropped");
        }
        self.retry.cancel();
        debug!("Update service stopped");
    }
}

impl std::fmt::Debug for UpdateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateService")
            .field("binding", &self.binding)
            .field("provider", &self.api.provider_name())
            .field("record", &self.record)
            .field("retry_interval", &self.retry_interval)
            .field("retry_pending", &self.retry.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryDnsApi;
    use crate::config::{DdnsConfig, DomainEntry, RecordType};

    fn binding(entry: DomainEntry) -> DomainBinding {
        let defaults = DdnsConfig {
            access_key_id: Some("id".to_string()),
            access_key_secret: Some("secret".to_string()),
            domain_name: Some("example.com".to_string()),
            ..DdnsConfig::new()
        };
        entry.resolve(&defaults).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn publishes_composed_value() {
        let api = MemoryDnsApi::new("example.com");
        let mut service = UpdateService::new(
            binding(DomainEntry::new("nas", RecordType::Aaaa).with_network("2001:db8::/64")),
            Box::new(api.clone()),
            Duration::from_secs(30),
        );

        service
            .on_address_changed(Some(ip("240e:3b7::aa:bb:cc:dd")))
            .await
            .unwrap();

        assert_eq!(service.record().value, "2001:db8::aa:bb:cc:dd");
        assert!(service.record().record_id.is_some());
        assert_eq!(api.records().await[0].value, "2001:db8::aa:bb:cc:dd");
    }

    #[tokio::test]
    async fn absent_or_unspecified_address_is_ignored() {
        let api = MemoryDnsApi::new("example.com");
        let mut service = UpdateService::new(
            binding(DomainEntry::new("home", RecordType::A)),
            Box::new(api.clone()),
            Duration::from_secs(30),
        );

        service.on_address_changed(None).await.unwrap();
        service.on_address_changed(Some(ip("0.0.0.0"))).await.unwrap();

        assert_eq!(api.mutations(), 0);
        assert!(!service.retry_pending());
    }

    #[tokio::test]
    async fn wrong_family_is_rejected_without_retry() {
        let api = MemoryDnsApi::new("example.com");
        let mut service = UpdateService::new(
            binding(DomainEntry::new("home", RecordType::A)),
            Box::new(api.clone()),
            Duration::from_secs(30),
        );

        assert!(service.on_address_changed(Some(ip("2001:db8::1"))).await.is_err());
        assert_eq!(api.mutations(), 0);
        assert!(!service.retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let api = MemoryDnsApi::new("example.com");
        let service = UpdateService::new(
            binding(DomainEntry::new("home", RecordType::A)),
            Box::new(api.clone()),
            Duration::from_secs(30),
        );
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(service.run(rx, shutdown_rx));

        tx.send(ip("203.0.113.5")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.records().await.len(), 1);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("service did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn run_stops_when_channel_closes() {
        let service = UpdateService::new(
            binding(DomainEntry::new("home", RecordType::A)),
            Box::new(MemoryDnsApi::new("example.com")),
            Duration::ZERO,
        );
        let (tx, rx) = mpsc::channel::<IpAddr>(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(tx);

        service.run(rx, shutdown_rx).await;
    }
}
