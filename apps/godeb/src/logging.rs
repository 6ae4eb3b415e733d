//! Diagnostic logging.
//!
//! Progress meant for the user is printed to stdout by the commands. Tracing
//! events go to stderr and are silent unless `-v` or `RUST_LOG` enables them.

use std::io;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for diagnostic events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Single-line human readable events.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Maps the repeat count of `-v` to a level.
#[must_use]
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Builds the filter: `RUST_LOG` when set, otherwise `godeb=<level>`.
fn build_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("godeb={}", level.as_str().to_lowercase())))
        .context("Failed to create tracing filter")
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set.
pub fn init_tracing(verbose: u8, format: LogFormat) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(level_for_verbosity(verbose))?);

    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), ?format, "tracing initialized");
    Ok(())
}
