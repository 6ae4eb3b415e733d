//! Host package manager integration.
//!
//! Building a package never touches the host. Installation goes through the
//! [`PackageInstaller`] trait so commands can be exercised with a fake.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::deb::control::PACKAGE_NAME;
use crate::errors::GodebError;

/// Installs and removes the `go` package on the host.
pub trait PackageInstaller {
    /// Installs a built `.deb`.
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::InstallerExecution`] if the package manager
    /// cannot be run or exits unsuccessfully.
    fn install(&self, package: &Path) -> Result<(), GodebError>;

    /// Purges the installed package.
    ///
    /// # Errors
    ///
    /// Same as [`PackageInstaller::install`].
    fn remove(&self) -> Result<(), GodebError>;

    /// Debian version of the installed package, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::InstallerExecution`] if the query tool cannot
    /// be run.
    fn installed_version(&self) -> Result<Option<String>, GodebError>;
}

/// Runs `dpkg`, elevated through `sudo` when not already root.
#[derive(Debug, Clone, Default)]
pub struct DpkgInstaller {
    sudo: Option<PathBuf>,
}

impl DpkgInstaller {
    /// Creates an installer for the current process.
    ///
    /// `sudo` is located on `PATH` only when the effective uid is not 0.
    #[must_use]
    pub fn new() -> Self {
        let sudo = if is_privileged() {
            None
        } else {
            which::which("sudo").ok()
        };
        if sudo.is_none() && !is_privileged() {
            tracing::warn!("not running as root and sudo was not found; running dpkg directly");
        }
        Self::with_sudo(sudo)
    }

    /// Creates an installer with an explicit elevation program.
    #[must_use]
    pub fn with_sudo(sudo: Option<PathBuf>) -> Self {
        Self { sudo }
    }

    fn privileged_command<I, S>(&self, program: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = match &self.sudo {
            Some(sudo) => {
                let mut command = Command::new(sudo);
                command.arg(program);
                command
            }
            None => Command::new(program),
        };
        command.args(args);
        command
    }

    fn install_command(&self, package: &Path) -> Command {
        self.privileged_command("dpkg", [OsStr::new("-i"), package.as_os_str()])
    }

    fn remove_command(&self) -> Command {
        self.privileged_command("dpkg", ["--purge", PACKAGE_NAME])
    }

    fn query_command() -> Command {
        let mut command = Command::new("dpkg-query");
        command.args(["-W", "-f=${Version}", PACKAGE_NAME]);
        command
    }
}

impl PackageInstaller for DpkgInstaller {
    fn install(&self, package: &Path) -> Result<(), GodebError> {
        run_inherited(self.install_command(package))
    }

    fn remove(&self) -> Result<(), GodebError> {
        run_inherited(self.remove_command())
    }

    fn installed_version(&self) -> Result<Option<String>, GodebError> {
        let mut command = Self::query_command();
        let line = describe(&command);
        tracing::debug!(command = %line, "querying installed version");

        let output = command
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| GodebError::installer_execution(&line, e.to_string()))?;

        // dpkg-query exits 1 for unknown packages.
        if !output.status.success() {
            return Ok(None);
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!version.is_empty()).then_some(version))
    }
}

/// Runs a command with the terminal attached so `sudo` can prompt.
fn run_inherited(mut command: Command) -> Result<(), GodebError> {
    let line = describe(&command);
    tracing::info!(command = %line, "running package manager");

    let status = command
        .status()
        .map_err(|e| GodebError::installer_execution(&line, e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(GodebError::installer_execution(line, status.to_string()))
    }
}

/// Renders a command line for messages.
fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(unix)]
fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_privileged() -> bool {
    false
}
