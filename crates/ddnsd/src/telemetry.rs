//! Logging setup
//!
//! Level comes from the configuration, `RUST_LOG` overrides it. With a log
//! file configured, output is appended to it (parent directories are
//! created); if the file cannot be opened a warning is logged and stdout is
//! used instead.

use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ddns_core::LogLevel;

/// Install the global subscriber
pub fn init(level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let mut file_error = None;
    let (writer, ansi) = match log_file {
        Some(path) => match open_log_file(path) {
            Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
            Err(e) => {
                file_error = Some((path, e));
                (BoxMakeWriter::new(std::io::stdout), true)
            }
        },
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .try_init()?;

    if let Some((path, e)) = file_error {
        warn!("Failed to open log file {}: {}, logging to stdout", path.display(), e);
    }

    Ok(())
}

/// Filter for `level`, keeping HTTP client internals quiet
fn default_directives(level: LogLevel) -> String {
    format!(
        "{level},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn",
        level = level.as_filter()
    )
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
