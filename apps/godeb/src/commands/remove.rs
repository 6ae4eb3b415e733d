//! Remove command for the godeb CLI.

use anyhow::{Context, Result};

use crate::installer::{DpkgInstaller, PackageInstaller};

/// Purges the installed `go` package.
///
/// # Errors
///
/// Returns [`crate::errors::GodebError::InstallerExecution`] if dpkg fails.
pub fn execute() -> Result<()> {
    run(&DpkgInstaller::new())
}

fn run(installer: &dyn PackageInstaller) -> Result<()> {
    installer.remove().context("while removing go package")?;
    println!("Go package removed.");
    Ok(())
}
