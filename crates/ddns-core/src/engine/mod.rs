//! Core DDNS daemon
//!
//! The [`Daemon`] is responsible for:
//! - Refreshing the IPv4 and IPv6 address every check interval
//! - Fanning address changes out to the [`UpdateService`] of every binding
//! - Draining the services on shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐
//! │ Ipv4Provider │  │ Ipv6Provider │
//! └──────────────┘  └──────────────┘
//!         │ refresh()       │
//!         └────────┬────────┘
//!                  ▼
//!           ┌─────────────┐
//!           │   Daemon    │─── shutdown (watch) ───┐
//!           └─────────────┘                        │
//!                  │ mpsc(1) per binding           │
//!         ┌────────┼──────────────┐                │
//!         ▼        ▼              ▼                ▼
//! ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//! │UpdateService │ │UpdateService │ │UpdateService │ (one task each)
//! │  A  home     │ │  A  @        │ │  AAAA nas    │
//! └──────────────┘ └──────────────┘ └──────────────┘
//!         │                │                │
//!         ▼                ▼                ▼
//!                   DnsApi::auto_update
//! ```
//!
//! ## Lifecycle
//!
//! `Starting → Running → Draining → Stopped`
//!
//! 1. [`Daemon::new`] validates bindings and builds the services (Starting)
//! 2. [`Daemon::start`] spawns one task per service (Running)
//! 3. [`Daemon::check`] runs once per check interval
//! 4. [`Daemon::shutdown`] broadcasts cancellation (Draining) and joins
//!    every task (Stopped)

pub mod reconcile;
pub mod retry;
pub mod service;

pub use retry::RetryTimer;
pub use service::UpdateService;

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::registry::ProviderRegistry;
use crate::traits::{AddressProvider, IpVersion};

/// Daemon lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Services built, no task running yet
    Starting,
    /// Service tasks running, checks may be performed
    Running,
    /// Cancellation broadcast, waiting for service tasks
    Draining,
    /// Every service task has exited
    Stopped,
}

/// Channel from the daemon to one running service
struct Route {
    version: IpVersion,
    name: String,
    events: mpsc::Sender<IpAddr>,
}

/// Core DDNS daemon
///
/// ## Threading
///
/// The address providers are owned by the daemon and only touched by the
/// control loop. Each service runs on its own task and is reached through a
/// capacity-1 channel: delivering an address waits until the service has
/// taken the previous one.
pub struct Daemon {
    state: DaemonState,
    check_interval: Duration,

    ipv4: Box<dyn AddressProvider>,
    ipv6: Box<dyn AddressProvider>,

    /// Services waiting for [`Daemon::start`]
    services: Vec<UpdateService>,
    routes: Vec<Route>,
    tasks: Vec<JoinHandle<()>>,

    shutdown_tx: watch::Sender<bool>,
    span: Span,
}

impl Daemon {
    /// Build a daemon from configuration
    ///
    /// Each `DomainList` entry is resolved against the global settings.
    /// Invalid entries are logged and skipped; they never fail startup.
    ///
    /// # Errors
    ///
    /// - invalid process-wide settings (`CheckInterval` of 0)
    /// - `Provider` not registered in `registry`
    pub fn new(
        config: &DdnsConfig,
        registry: &ProviderRegistry,
        ipv4: Box<dyn AddressProvider>,
        ipv6: Box<dyn AddressProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let provider = config.provider_name();
        if !registry.has_provider(provider) {
            return Err(Error::config(format!(
                "Unknown provider type: {} (registered: {})",
                provider,
                registry.list_providers().join(", ")
            )));
        }

        let mut services = Vec::with_capacity(config.domain_list.len());
        for (index, entry) in config.domain_list.iter().enumerate() {
            let binding = match entry.resolve(config) {
                Ok(binding) => binding,
                Err(e) => {
                    error!(index, "Dynamic domain name configuration error: {}", e);
                    continue;
                }
            };

            let api = match registry.create_api(provider, &binding.credentials) {
                Ok(api) => api,
                Err(e) => {
                    error!(
                        index,
                        record = %binding.fqdn(),
                        "Failed to create {} client: {}", provider, e
                    );
                    continue;
                }
            };

            info!(
                record = %binding.fqdn(),
                record_type = %binding.record_type,
                subnet = ?binding.subnet.map(|s| s.to_string()),
                "Dynamic record configured"
            );
            services.push(UpdateService::new(binding, api, config.retry_interval()));
        }

        if services.is_empty() {
            warn!("No valid dynamic domain name configured, addresses will be watched but not published");
        }

        Ok(Self::with_services(
            services,
            config.check_interval(),
            ipv4,
            ipv6,
        ))
    }

    /// Build a daemon from ready-made services
    pub fn with_services(
        services: Vec<UpdateService>,
        check_interval: Duration,
        ipv4: Box<dyn AddressProvider>,
        ipv6: Box<dyn AddressProvider>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let span = info_span!("daemon", services = services.len());

        Self {
            state: DaemonState::Starting,
            check_interval,
            ipv4,
            ipv6,
            services,
            routes: Vec::new(),
            tasks: Vec::new(),
            shutdown_tx,
            span,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Number of bindings served
    pub fn service_count(&self) -> usize {
        self.services.len() + self.routes.len()
    }

    /// Spawn one task per service
    ///
    /// Must be called from within a tokio runtime. Calling it again while
    /// running does nothing.
    pub fn start(&mut self) {
        if self.state != DaemonState::Starting {
            return;
        }

        for service in self.services.drain(..) {
            let (tx, rx) = mpsc::channel(1);
            self.routes.push(Route {
                version: service.version(),
                name: service.binding().fqdn(),
                events: tx,
            });
            let shutdown = self.shutdown_tx.subscribe();
            self.tasks.push(tokio::spawn(service.run(rx, shutdown)));
        }

        self.state = DaemonState::Running;
        info!(parent: &self.span, "Daemon started with {} service(s)", self.routes.len());
    }

    /// Run one discovery cycle
    ///
    /// Refreshes IPv4 then IPv6. A changed address is delivered to every
    /// service of the matching record type, in binding order.
    pub async fn check(&mut self) {
        let span = self.span.clone();
        async {
            for version in [IpVersion::V4, IpVersion::V6] {
                let provider = match version {
                    IpVersion::V4 => &mut self.ipv4,
                    IpVersion::V6 => &mut self.ipv6,
                };
                let (ip, changed) = provider.refresh().await;
                if changed {
                    info!(%ip, "{} address changed, updating records", version);
                    dispatch(&self.routes, version, ip).await;
                } else {
                    debug!("{} address has not changed", version);
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Broadcast cancellation and wait for every service task
    pub async fn shutdown(&mut self) {
        if self.state == DaemonState::Stopped {
            return;
        }

        self.state = DaemonState::Draining;
        info!(parent: &self.span, "Draining {} service(s)", self.tasks.len());
        self.shutdown_tx.send_replace(true);
        self.routes.clear();

        let span = self.span.clone();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                error!(parent: &span, "Update service task failed: {}", e);
            }
        }

        self.services.clear();
        self.state = DaemonState::Stopped;
        info!(parent: &self.span, "Daemon exit safely");
    }

    /// Run the check loop until `shutdown` completes, then drain
    ///
    /// The first check happens one check interval after the call.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.start();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!(parent: &self.span, "Shutdown signal received");
                    break;
                }

                _ = tokio::time::sleep(self.check_interval) => {
                    self.check().await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Run until SIGINT or SIGTERM (Ctrl-C elsewhere)
    pub async fn run(&mut self) -> Result<()> {
        let mut failure = None;
        self.run_until(async {
            if let Err(e) = termination().await {
                failure = Some(e);
            }
        })
        .await;

        match failure {
            Some(e) => Err(Error::Network(e)),
            None => Ok(()),
        }
    }
}

#[cfg(unix)]
async fn termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

async fn dispatch(routes: &[Route], version: IpVersion, ip: IpAddr) {
    for route in routes.iter().filter(|route| route.version == version) {
        debug!(record = %route.name, %ip, "Delivering address");
        if route.events.send(ip).await.is_err() {
            warn!(record = %route.name, "Update service is no longer running");
        }
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("state", &self.state)
            .field("check_interval", &self.check_interval)
            .field("services", &self.service_count())
            .finish()
    }
}
