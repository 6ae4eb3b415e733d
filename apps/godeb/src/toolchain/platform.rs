//! Platform identification for release selection and packaging.
//!
//! A [`Platform`] is an explicit `{os, arch}` pair using Go's naming
//! (`linux`/`amd64`, `linux/386`, ...). Nothing downstream reads the process
//! environment, so catalog filtering and package building can be exercised
//! for any platform. [`Platform::detect`] is the only place that looks at the
//! host, and the CLI lets `--os`/`--arch` override it.

use std::fmt;

use crate::errors::GodebError;

/// Go architecture names and the Debian architecture each maps to.
const DEBIAN_ARCHITECTURES: [(&str, &str); 9] = [
    ("amd64", "amd64"),
    ("386", "i386"),
    ("arm", "armhf"),
    ("armv6l", "armhf"),
    ("arm64", "arm64"),
    ("ppc64le", "ppc64el"),
    ("s390x", "s390x"),
    ("riscv64", "riscv64"),
    ("loong64", "loong64"),
];

/// Target operating system and architecture, in Go naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system (`linux`, `freebsd`, ...).
    pub os: String,
    /// Architecture (`amd64`, `386`, `armv6l`, ...).
    pub arch: String,
}

impl Platform {
    /// Creates a platform from Go os/arch names.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detects the host platform from compile-time configuration.
    ///
    /// 32-bit ARM hosts map to `armv6l`, the name under which upstream
    /// publishes ARM tarballs. Unknown architectures are passed through
    /// unchanged so the failure surfaces at packaging time with the real name.
    #[must_use]
    pub fn detect() -> Self {
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "arm" => "armv6l",
            "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
            "loongarch64" => "loong64",
            other => other,
        };
        Self::new(std::env::consts::OS, arch)
    }

    /// Debian architecture name for this platform.
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::UnsupportedArchitecture`] if the architecture is
    /// not in the mapping table.
    pub fn debian_arch(&self) -> Result<&'static str, GodebError> {
        debian_arch(&self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Translates a Go architecture name to a Debian architecture name.
///
/// # Errors
///
/// Returns [`GodebError::UnsupportedArchitecture`] for unmapped names.
pub fn debian_arch(arch: &str) -> Result<&'static str, GodebError> {
    DEBIAN_ARCHITECTURES
        .iter()
        .find(|(go, _)| *go == arch)
        .map(|(_, deb)| *deb)
        .ok_or_else(|| GodebError::unsupported_architecture(arch))
}
