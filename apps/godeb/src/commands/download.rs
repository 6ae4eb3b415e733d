//! Download command for the godeb CLI.
//!
//! Fetches an upstream tarball and transcodes it into
//! `go_<version>_<arch>.deb` in the output directory.
//!
//! ## Usage
//!
//! ```bash
//! godeb download                # Newest stable release
//! godeb download 1.21.5         # Exact version
//! godeb download --prerelease   # Newest release including rc/beta
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::deb::{DebBuilder, build_package};
use crate::errors::GodebError;
use crate::toolchain::{Catalog, CatalogEntry, Platform, download_file, fetch_catalog, verify_checksum};

/// Arguments shared by the download and install commands.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Exact Go version (e.g., "1.21.5" or "1.22rc1").
    ///
    /// If omitted, the newest stable release is used.
    pub version: Option<String>,

    /// Consider unstable releases when picking the newest version.
    #[clap(long)]
    pub prerelease: bool,

    /// Directory the package is written to.
    #[clap(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,
}

/// Executes the download command.
///
/// # Errors
///
/// Returns an error if the architecture is unsupported, the listing cannot
/// be fetched, the version is unknown, or the download or build fails.
pub async fn execute(args: &DownloadArgs, platform: &Platform) -> Result<()> {
    let (_, entry) = resolve(args, platform).await?;
    let path = build(&entry, platform, &args.output_dir).await?;
    println!("package {} ready", path.display());
    Ok(())
}

/// Picks the release to package.
///
/// The architecture is checked first so an unsupported platform fails
/// without any network access.
///
/// # Errors
///
/// Returns [`GodebError::UnsupportedArchitecture`],
/// [`GodebError::VersionNotFound`] or a catalog error.
pub async fn resolve(args: &DownloadArgs, platform: &Platform) -> Result<(DebBuilder, CatalogEntry)> {
    platform.debian_arch()?;

    println!("Fetching release listing...");
    let catalog = fetch_catalog(platform, true).await?;
    let entry = choose(&catalog, args)?.clone();
    let builder = DebBuilder::new(&entry.version, platform)?;

    tracing::info!(version = %entry.version, url = %entry.url, "selected release");
    Ok((builder, entry))
}

/// Applies the version flags to the catalog.
fn choose<'a>(catalog: &'a Catalog, args: &DownloadArgs) -> Result<&'a CatalogEntry, GodebError> {
    match args.version.as_deref() {
        Some(version) => catalog.select(Some(version)),
        None if args.prerelease => catalog.select(None),
        None => {
            let newest_stable = catalog
                .entries()
                .iter()
                .find(|e| e.stable)
                .ok_or_else(|| GodebError::version_not_found("latest"))?;
            Ok(newest_stable)
        }
    }
}

/// Downloads, verifies and transcodes `entry` into `output_dir`.
///
/// # Errors
///
/// Returns an error if the download fails, the checksum does not match, or
/// the package cannot be built.
pub async fn build(entry: &CatalogEntry, platform: &Platform, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let scratch = tempfile::Builder::new()
        .prefix("godeb-")
        .tempdir()
        .context("Failed to create download directory")?;
    let archive_path = scratch.path().join(archive_name(&entry.url));

    println!("processing {}", entry.url);
    download_file(&entry.url, &archive_path).await?;

    if entry.sha256.is_empty() {
        tracing::warn!(version = %entry.version, "release listing has no checksum; skipping verification");
    } else {
        println!("Verifying checksum...");
        verify_checksum(&archive_path, &entry.sha256)?;
    }

    println!("Building package...");
    let version = entry.version.clone();
    let platform = platform.clone();
    let output_dir = output_dir.to_path_buf();
    let path = tokio::task::spawn_blocking(move || {
        transcode(&archive_path, &version, &platform, &output_dir)
    })
    .await
    .context("Package build task panicked")??;

    drop(scratch);
    Ok(path)
}

/// Builds the package from an archive already on disk.
fn transcode(archive: &Path, version: &str, platform: &Platform, output_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open downloaded archive: {}", archive.display()))?;
    Ok(build_package(BufReader::new(file), version, platform, output_dir)?)
}

/// Last path segment of the download URL.
fn archive_name(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("go.tar.gz")
}
