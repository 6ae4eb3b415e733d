//! Install command for the godeb CLI.
//!
//! Builds the package exactly like `download`, then hands it to dpkg. A
//! failed installation keeps the built package on disk.
//!
//! ## Usage
//!
//! ```bash
//! godeb install            # Newest stable release
//! godeb install 1.21.5     # Exact version
//! ```

use anyhow::{Context, Result};
use clap::Args;

use super::download::{self, DownloadArgs};
use crate::deb::DebBuilder;
use crate::errors::GodebError;
use crate::installer::{DpkgInstaller, PackageInstaller};
use crate::toolchain::Platform;

/// Arguments for the install command.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: DownloadArgs,
}

/// Executes the install command with dpkg.
///
/// # Errors
///
/// See [`install_with`].
pub async fn execute(args: &InstallArgs, platform: &Platform) -> Result<()> {
    install_with(&DpkgInstaller::new(), args, platform).await
}

/// Builds the requested release and installs it through `installer`.
///
/// # Process
///
/// 1. Select the release for the platform
/// 2. Refuse if the same package version is already installed
/// 3. Download, verify and build the package
/// 4. Hand the package to the installer
///
/// The built package stays in the output directory when installation fails.
///
/// # Errors
///
/// Returns [`GodebError::AlreadyInstalled`] when there is nothing to do, any
/// error from building, or [`GodebError::InstallerExecution`] if the
/// installer fails.
pub async fn install_with(
    installer: &dyn PackageInstaller,
    args: &InstallArgs,
    platform: &Platform,
) -> Result<()> {
    let (builder, entry) = download::resolve(&args.target, platform).await?;
    ensure_not_installed(installer, &builder)?;

    let path = download::build(&entry, platform, &args.target.output_dir).await?;
    println!("package {} ready", path.display());

    println!("Installing {}...", path.display());
    installer
        .install(&path)
        .with_context(|| format!("while installing {}", path.display()))?;

    println!("Go {} installed.", entry.version);
    Ok(())
}

/// Fails if the installed package has the version about to be built.
///
/// A failing query is logged and treated as "not installed".
fn ensure_not_installed(
    installer: &dyn PackageInstaller,
    builder: &DebBuilder,
) -> Result<(), GodebError> {
    match installer.installed_version() {
        Ok(Some(installed)) if installed == builder.debian_version() => {
            Err(GodebError::AlreadyInstalled {
                version: builder.upstream_version().to_string(),
            })
        }
        Ok(installed) => {
            tracing::debug!(?installed, "installed package version");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot query installed package version");
            Ok(())
        }
    }
}
