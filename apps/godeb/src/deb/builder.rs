//! Assembles the three-member `.deb` container and writes it atomically.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::ar::{ArWriter, MemberHeader};
use super::control::{ControlMetadata, PACKAGE_NAME, debian_version};
use super::payload::{PayloadSummary, write_payload};
use crate::errors::GodebError;
use crate::toolchain::Platform;

/// Contents of the `debian-binary` member.
pub const FORMAT_MARKER: &[u8] = b"2.0\n";

const MARKER_MEMBER: &str = "debian-binary";
const CONTROL_MEMBER: &str = "control.tar.gz";
const DATA_MEMBER: &str = "data.tar.gz";

/// Builds one package for a fixed version and architecture.
///
/// The architecture is mapped when the builder is created, so an unsupported
/// platform fails before any stream is opened.
#[derive(Debug, Clone)]
pub struct DebBuilder {
    upstream_version: String,
    debian_version: String,
    architecture: &'static str,
}

impl DebBuilder {
    /// Creates a builder for an upstream Go version on `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::UnsupportedArchitecture`] if the platform has
    /// no Debian architecture.
    pub fn new(version: &str, platform: &Platform) -> Result<Self, GodebError> {
        let architecture = platform.debian_arch()?;
        Ok(Self {
            upstream_version: version.to_string(),
            debian_version: debian_version(version),
            architecture,
        })
    }

    /// The upstream version this package carries.
    #[must_use]
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// The Debian version written to `control`.
    #[must_use]
    pub fn debian_version(&self) -> &str {
        &self.debian_version
    }

    /// `go_<debian version>_<architecture>.deb`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{PACKAGE_NAME}_{}_{}.deb",
            self.debian_version, self.architecture
        )
    }

    /// Transcodes `source` into a container written to `out`.
    ///
    /// The payload member is spooled to an unnamed file in `spool_dir`
    /// first, since the control member that precedes it depends on it.
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::SourceDecode`] for a bad source archive and
    /// [`GodebError::OutputWrite`] when the spool file or `out` fails.
    pub fn write_to<R: Read, W: Write>(
        &self,
        source: R,
        out: W,
        spool_dir: &Path,
    ) -> Result<(W, PayloadSummary), GodebError> {
        let spool = tempfile::tempfile_in(spool_dir)
            .map_err(|e| GodebError::output_write(spool_dir, e))?;
        let (summary, spool) = write_payload(source, BufWriter::new(spool))?;
        let (mut spool, data_len) =
            rewind_spool(spool).map_err(|e| GodebError::output_write(spool_dir, e))?;

        let control = ControlMetadata::new(
            self.debian_version.as_str(),
            self.architecture,
            summary.installed_bytes,
            summary.checksums.clone(),
        )
        .to_tar_gz()
        .map_err(|e| GodebError::output_write(CONTROL_MEMBER, e))?;

        let out = assemble(out, &control, &mut spool, data_len)
            .map_err(|e| GodebError::output_write(self.file_name(), e))?;

        Ok((out, summary))
    }

    /// Builds the package into `dir` and returns the final path.
    ///
    /// The container is written to a hidden temporary file in `dir` and
    /// renamed into place only after it has been flushed and synced. On any
    /// error the temporary file is removed and nothing exists at the final
    /// name.
    ///
    /// # Errors
    ///
    /// Same as [`DebBuilder::write_to`], plus [`GodebError::OutputWrite`] if
    /// the temporary file cannot be created, synced or renamed.
    pub fn build_in<R: Read>(&self, source: R, dir: &Path) -> Result<PathBuf, GodebError> {
        let final_path = dir.join(self.file_name());
        let _span = tracing::info_span!(
            "build_package",
            version = %self.upstream_version,
            arch = self.architecture
        )
        .entered();

        let temp = temp_builder()
            .tempfile_in(dir)
            .map_err(|e| GodebError::output_write(dir, e))?;
        tracing::debug!(temp = %temp.path().display(), "writing package");

        let (out, summary) = self.write_to(source, BufWriter::new(temp), dir)?;
        let temp = out
            .into_inner()
            .map_err(|e| GodebError::output_write(&final_path, e.into_error()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| GodebError::output_write(&final_path, e))?;
        temp.persist(&final_path)
            .map_err(|e| GodebError::output_write(&final_path, e.error))?;

        tracing::info!(
            path = %final_path.display(),
            files = summary.checksums.len(),
            installed_bytes = summary.installed_bytes,
            "package built"
        );
        Ok(final_path)
    }
}

/// Builds `go_<version>_<arch>.deb` from `source` into `dir`.
///
/// # Errors
///
/// See [`DebBuilder::new`] and [`DebBuilder::build_in`].
pub fn build_package<R: Read>(
    source: R,
    version: &str,
    platform: &Platform,
    dir: &Path,
) -> Result<PathBuf, GodebError> {
    DebBuilder::new(version, platform)?.build_in(source, dir)
}

fn temp_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".godeb-").suffix(".inprogress");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder
}

fn assemble<W: Write>(out: W, control: &[u8], spool: &mut File, data_len: u64) -> io::Result<W> {
    let mut ar = ArWriter::new(out)?;
    ar.append_bytes(MARKER_MEMBER, FORMAT_MARKER)?;
    ar.append_bytes(CONTROL_MEMBER, control)?;
    ar.append(
        &MemberHeader::new(DATA_MEMBER, data_len),
        BufReader::new(spool),
    )?;
    ar.finish()
}

/// Flushes the spool and seeks back to its start, returning its length.
fn rewind_spool(spool: BufWriter<File>) -> io::Result<(File, u64)> {
    let mut file = spool.into_inner().map_err(io::IntoInnerError::into_error)?;
    let len = file.stream_position()?;
    file.seek(SeekFrom::Start(0))?;
    Ok((file, len))
}
