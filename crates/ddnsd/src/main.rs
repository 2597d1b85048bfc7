// # ddnsd - DDNS Daemon
//
// The ddnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from the command line, environment and config file
// 2. Initializing logging and the runtime
// 3. Wiring the address lookups and the provider registry into a `Daemon`
// 4. Translating SIGINT / SIGTERM into a graceful drain
//
// All DDNS logic lives in ddns-core.
//
// ## Configuration
//
// ```bash
// # single record from flags / environment
// export ALIDNS_ACCESSKEYID=...
// export ALIDNS_ACCESSKEYSECRET=...
// ddnsd --domain example.com --rr home --type A
//
// # any number of records from a file
// ddnsd --conf /etc/ddns.json
// ```

mod cli;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};

use ddns_core::config::DEFAULT_PROVIDER;
use ddns_core::discovery::{Ipv4Provider, Ipv6Provider};
use ddns_core::{Daemon, DdnsConfig, LogLevel, ProviderRegistry};
use ddns_ip_http::HttpLookup;
use ddns_ip_probe::UdpProbe;

use crate::cli::Cli;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let level = config.log_level.unwrap_or(LogLevel::Info);
    if let Err(e) = telemetry::init(level, config.log_file.as_deref().map(Path::new)) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");
    info!(
        provider = config.provider_name(),
        check_interval = config.check_interval,
        retry_interval = config.retry_interval,
        "Configuration loaded: {} record(s)",
        config.domain_list.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match build_daemon(&config) {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(daemon).await {
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire lookups, providers and the registry into a daemon
fn build_daemon(config: &DdnsConfig) -> Result<Daemon> {
    let registry = ProviderRegistry::with_builtins();

    if is_dry_run(config) {
        warn!(
            provider = config.provider_name(),
            "Records are kept in memory only, no remote DNS record will be changed"
        );
    }

    let ipv4 = Ipv4Provider::new(config.ipv4_providers.clone(), Box::new(HttpLookup::ipv4()?));
    let ipv6 = Ipv6Provider::new(
        config.ipv6_providers.clone(),
        Box::new(HttpLookup::ipv6()?),
        Box::new(UdpProbe::new()),
    );

    let daemon = Daemon::new(config, &registry, Box::new(ipv4), Box::new(ipv6))?;
    Ok(daemon)
}

/// Whether updates only reach the built-in in-memory zone
fn is_dry_run(config: &DdnsConfig) -> bool {
    config.provider_name() == DEFAULT_PROVIDER
}

/// Run the daemon until SIGTERM or SIGINT, then drain
async fn run_daemon(mut daemon: Daemon) -> Result<()> {
    daemon.run().await?;
    info!("ddnsd stopped");
    Ok(())
}
