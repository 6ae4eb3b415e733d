//! Package metadata: the `control.tar.gz` member.

use std::fmt::Write as _;
use std::io;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Debian package name.
pub const PACKAGE_NAME: &str = "go";

/// Debian revision appended to every upstream version.
pub const DEBIAN_REVISION: &str = "godeb1";

const MAINTAINER: &str = "godeb <godeb@localhost>";
const HOMEPAGE: &str = "https://go.dev";
const SUMMARY: &str = "Go programming language compiler and tools (gc)";
const DESCRIPTION: &str = "\
The Go programming language is an open source project to make programmers
more productive. This package was translated on the fly from the upstream
binary distribution by godeb.";
const PROVIDES: &str = "golang, golang-go";
const CONFLICTS: &str = "golang, golang-go, golang-src, golang-doc, golang-tip, golang-weekly";

/// Pre-release tags that must sort before the final release in dpkg.
const PRERELEASE_TAGS: [&str; 3] = ["rc", "beta", "alpha"];

/// Converts an upstream Go version into a Debian version.
///
/// A `~` is placed before the first pre-release tag so dpkg orders
/// `1.2~rc1` below `1.2`, and the godeb revision is appended.
///
/// ```ignore
/// assert_eq!(debian_version("1.22rc1"), "1.22~rc1-godeb1");
/// ```
#[must_use]
pub fn debian_version(upstream: &str) -> String {
    let tag_at = PRERELEASE_TAGS
        .iter()
        .filter_map(|tag| upstream.find(tag))
        .min();
    let mut version = match tag_at {
        Some(at) => format!("{}~{}", &upstream[..at], &upstream[at..]),
        None => upstream.to_string(),
    };
    version.push('-');
    version.push_str(DEBIAN_REVISION);
    version
}

/// Installed size in KiB, rounded up.
#[must_use]
pub fn installed_size_kib(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

/// MD5 of one regular file in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChecksum {
    /// Installed path relative to `/` (e.g., `usr/local/go/bin/go`).
    pub path: String,
    /// Lowercase hex MD5.
    pub md5: String,
}

/// The fields written to `control` plus the `md5sums` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMetadata {
    /// Debian package name, always `go`.
    pub package: String,
    /// Debian version (e.g., `1.2~rc1-godeb1`).
    pub version: String,
    /// Debian architecture (e.g., `i386`).
    pub architecture: String,
    /// Total size of the payload's regular files, rounded up to KiB.
    pub installed_size_kib: u64,
    /// `Maintainer` field.
    pub maintainer: String,
    /// Synopsis line followed by the indented long description.
    pub description: String,
    /// One entry per regular file, in payload order.
    pub checksums: Vec<FileChecksum>,
}

impl ControlMetadata {
    /// Assembles metadata for a Debian version, architecture and payload.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        architecture: impl Into<String>,
        installed_bytes: u64,
        checksums: Vec<FileChecksum>,
    ) -> Self {
        Self {
            package: PACKAGE_NAME.to_string(),
            version: version.into(),
            architecture: architecture.into(),
            installed_size_kib: installed_size_kib(installed_bytes),
            maintainer: MAINTAINER.to_string(),
            description: format!("{SUMMARY}\n{}", indent_description(DESCRIPTION)),
            checksums,
        }
    }

    /// Renders the `control` file.
    #[must_use]
    pub fn control_file(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Package: {}", self.package);
        let _ = writeln!(out, "Version: {}", self.version);
        let _ = writeln!(out, "Architecture: {}", self.architecture);
        let _ = writeln!(out, "Maintainer: {}", self.maintainer);
        let _ = writeln!(out, "Installed-Size: {}", self.installed_size_kib);
        let _ = writeln!(out, "Provides: {PROVIDES}");
        let _ = writeln!(out, "Conflicts: {CONFLICTS}");
        let _ = writeln!(out, "Section: devel");
        let _ = writeln!(out, "Priority: optional");
        let _ = writeln!(out, "Homepage: {HOMEPAGE}");
        let _ = writeln!(out, "Description: {}", self.description);
        out
    }

    /// Renders `md5sums`, one `<md5>  <path>` line per regular file.
    #[must_use]
    pub fn md5sums_file(&self) -> String {
        self.checksums.iter().fold(String::new(), |mut out, c| {
            let _ = writeln!(out, "{}  {}", c.md5, c.path);
            out
        })
    }

    /// Builds the gzip-compressed control tarball.
    ///
    /// Entries are root-owned, mode `0644`, with a zero timestamp.
    ///
    /// # Errors
    ///
    /// Returns any error from the tar or gzip encoder.
    pub fn to_tar_gz(&self) -> io::Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::best());
        let mut builder = tar::Builder::new(encoder);

        for (name, contents) in [
            ("control", self.control_file()),
            ("md5sums", self.md5sums_file()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_uid(0);
            header.set_gid(0);
            header.set_username("root")?;
            header.set_groupname("root")?;
            header.set_mtime(0);
            builder.append_data(&mut header, name, contents.as_bytes())?;
        }

        builder.into_inner()?.finish()
    }
}

/// Continuation lines of a Debian description start with a space, and blank
/// lines are written as ` .`.
fn indent_description(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                " .".to_string()
            } else {
                format!(" {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
