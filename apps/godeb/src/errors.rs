//! Error types for godeb.
//!
//! Library-style modules (`toolchain`, `deb`, `installer`) return
//! [`GodebError`] so callers can tell a failed build from a failed
//! installation. Command glue wraps these in `anyhow` with extra context, and
//! `main` downcasts back to pick the exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed source error for variants whose cause comes from several crates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Consolidated error type for catalog, build and install operations.
#[derive(Debug, Error)]
pub enum GodebError {
    /// The release listing could not be retrieved.
    #[error("failed to fetch release listing from {url}: {message}")]
    CatalogFetch {
        /// Listing URL.
        url: String,
        /// What went wrong (HTTP status or transport failure).
        message: String,
        /// The underlying transport error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The release listing was fetched but is not valid.
    #[error("malformed release listing from {url}")]
    CatalogDecode {
        /// Listing URL.
        url: String,
        /// The JSON decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The requested version does not appear in the listing.
    #[error("go version {version} not found in the release listing")]
    VersionNotFound {
        /// The version that was requested.
        version: String,
    },

    /// No Debian architecture is known for the platform architecture.
    #[error("unsupported architecture: {arch}")]
    UnsupportedArchitecture {
        /// The Go architecture name.
        arch: String,
    },

    /// The source tarball is corrupt, truncated or has unusable entries.
    #[error("cannot decode source archive: {message}")]
    SourceDecode {
        /// Description of the offending entry or stream position.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the package (or its scratch files) failed.
    #[error("cannot write {}", path.display())]
    OutputWrite {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The downloaded archive does not match the published checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The checksum from the release listing.
        expected: String,
        /// The checksum of the downloaded file.
        actual: String,
    },

    /// The same package version is already installed.
    #[error("go version {version} is already installed")]
    AlreadyInstalled {
        /// The upstream version.
        version: String,
    },

    /// The host package manager failed.
    #[error("{command} failed: {message}")]
    InstallerExecution {
        /// The command line that was run.
        command: String,
        /// Exit status or spawn failure.
        message: String,
    },
}

impl GodebError {
    /// Creates a new `CatalogFetch` error without a source.
    #[must_use]
    pub fn catalog_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogFetch {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `CatalogFetch` error with a transport source.
    #[must_use]
    pub fn catalog_fetch_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Self::CatalogFetch {
            url: url.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `VersionNotFound` error.
    #[must_use]
    pub fn version_not_found(version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            version: version.into(),
        }
    }

    /// Creates a new `UnsupportedArchitecture` error.
    #[must_use]
    pub fn unsupported_architecture(arch: impl Into<String>) -> Self {
        Self::UnsupportedArchitecture { arch: arch.into() }
    }

    /// Creates a new `SourceDecode` error.
    #[must_use]
    pub fn source_decode(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceDecode {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `OutputWrite` error.
    #[must_use]
    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new `ChecksumMismatch` error.
    #[must_use]
    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `InstallerExecution` error.
    #[must_use]
    pub fn installer_execution(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InstallerExecution {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for failures of the host package manager.
    ///
    /// These are reported separately because the package itself was built.
    #[must_use]
    pub fn is_installer_failure(&self) -> bool {
        matches!(self, Self::InstallerExecution { .. })
    }
}
