#![warn(clippy::pedantic)]

//! # godeb
//!
//! Translates upstream Go release tarballs into Debian packages on the fly.
//!
//! ## Subcommands
//!
//! - `list` - List available Go versions
//! - `download` - Download a release and build `go_<version>_<arch>.deb`
//! - `install` - Build the package and install it with dpkg
//! - `remove` - Purge the installed package
//!
//! ## Exit Codes
//!
//! - `0` - Success
//! - `1` - Listing, download or build failure (no package left behind)
//! - `2` - The package was built but dpkg failed
//!
//! ## Examples
//!
//! ```bash
//! godeb list
//! godeb download 1.21.5
//! godeb install
//! ```

mod commands;
mod deb;
mod errors;
mod installer;
mod logging;
mod toolchain;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{download, install, list, remove};
use errors::GodebError;
use logging::LogFormat;
use toolchain::Platform;

/// Exit code for failures of the host package manager.
const INSTALLER_EXIT_CODE: i32 = 2;

/// Translates upstream Go tarballs into Debian packages.
#[derive(Parser)]
#[command(
    name = "godeb",
    author,
    version,
    about = "godeb dynamically translates stock upstream Go tarballs to deb packages",
    after_help = "\
ENVIRONMENT VARIABLES:
    GODEB_DL_SERVER         Release listing server (default: https://go.dev)
    GODEB_DOWNLOAD_BASE     Archive base URL (default: https://dl.google.com/go/)
    GODEB_OS, GODEB_ARCH    Target platform in Go naming (default: host)
    RUST_LOG                Diagnostic log filter (overrides --verbose)"
)]
pub struct Cli {
    /// Target operating system (Go naming).
    #[clap(long, global = true, env = "GODEB_OS")]
    pub os: Option<String>,

    /// Target architecture (Go naming, e.g. amd64, 386, armv6l).
    #[clap(long, global = true, env = "GODEB_ARCH")]
    pub arch: Option<String>,

    /// Increase diagnostic output on stderr (repeatable).
    #[clap(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Format of diagnostic output.
    #[clap(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the godeb CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// List available Go versions, newest first.
    List(list::ListArgs),

    /// Download a Go release and transform it into a deb package.
    Download(download::DownloadArgs),

    /// Download a Go release, transform it into a deb package, and install it.
    Install(install::InstallArgs),

    /// Remove the installed Go package.
    Remove,
}

impl Cli {
    /// The target platform: the host, with `--os`/`--arch` overrides.
    fn platform(&self) -> Platform {
        let host = Platform::detect();
        let pick = |value: &Option<String>, fallback: String| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map_or(fallback, str::to_string)
        };
        Platform::new(pick(&self.os, host.os), pick(&self.arch, host.arch))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error and returns the exit code.
///
/// Installer failures get their own code because the package was built and
/// is still on disk.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:#}");
    match e.downcast_ref::<GodebError>() {
        Some(err) if err.is_installer_failure() => {
            eprintln!("The package was built successfully; only the installation failed.");
            INSTALLER_EXIT_CODE
        }
        _ => 1,
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose, cli.log_format)?;

    let platform = cli.platform();
    tracing::debug!(%platform, "target platform");

    match &cli.command {
        Commands::List(args) => list::execute(args, &platform).await,
        Commands::Download(args) => download::execute(args, &platform).await,
        Commands::Install(args) => install::execute(args, &platform).await,
        Commands::Remove => remove::execute(),
    }
}
