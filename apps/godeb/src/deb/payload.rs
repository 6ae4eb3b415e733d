//! Rewrites the upstream tarball into the `data.tar.gz` member.
//!
//! The upstream archive holds a single `go/` directory. Entries are streamed
//! one at a time, re-rooted under [`INSTALL_ROOT`], forced to `root:root`,
//! and written to the sink while an MD5 and the installed size are
//! accumulated for the control member.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

use super::control::FileChecksum;
use crate::errors::GodebError;

/// Where the toolchain is installed, relative to `/`.
pub const INSTALL_ROOT: &str = "usr/local/go";

/// Directory that receives command symlinks, relative to `/`.
const BIN_LINK_DIR: &str = "usr/bin";

/// Link target prefix from [`BIN_LINK_DIR`] back into the toolchain.
const BIN_LINK_TARGET: &str = "../local/go/bin";

/// Parents of [`INSTALL_ROOT`] and [`BIN_LINK_DIR`], emitted first.
const PARENT_DIRS: [&str; 3] = ["usr", "usr/local", "usr/bin"];

/// Label used in write errors for the payload member.
const PAYLOAD_LABEL: &str = "data.tar.gz";

/// What the payload pass learned about the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadSummary {
    /// Sum of regular file sizes in bytes.
    pub installed_bytes: u64,
    /// MD5 of every regular file, in archive order.
    pub checksums: Vec<FileChecksum>,
    /// Upstream commands linked into `/usr/bin`.
    pub commands: Vec<String>,
}

/// Streams `source` (a gzip-compressed tarball) into `sink` as a
/// gzip-compressed, re-rooted payload and returns the sink when done.
///
/// # Errors
///
/// - [`GodebError::SourceDecode`] for corrupt or truncated input, entries
///   with invalid or escaping names, or more than one top-level directory.
/// - [`GodebError::OutputWrite`] when writing to `sink` fails.
pub fn write_payload<R: Read, W: Write>(
    source: R,
    sink: W,
) -> Result<(PayloadSummary, W), GodebError> {
    let mut archive = tar::Archive::new(GzDecoder::new(source));
    let mut builder = tar::Builder::new(GzEncoder::new(sink, Compression::default()));
    let mut summary = PayloadSummary::default();
    let mut top_level: Option<OsString> = None;

    for dir in PARENT_DIRS {
        append_directory(&mut builder, Path::new(dir), 0o755, 0)?;
    }

    let entries = archive
        .entries()
        .map_err(|e| GodebError::source_decode("cannot read archive", e))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| GodebError::source_decode("cannot read archive entry", e))?;
        let source_path = entry
            .path()
            .map_err(|e| GodebError::source_decode("entry has an invalid name", e))?
            .into_owned();
        let relative = strip_top_level(&source_path, &mut top_level)?;
        let target = match &relative {
            Some(rel) => Path::new(INSTALL_ROOT).join(rel),
            None => PathBuf::from(INSTALL_ROOT),
        };

        let header = entry.header();
        let entry_type = header.entry_type();
        let mode = header
            .mode()
            .map_err(|e| decode_error(&source_path, "has an invalid mode", e))?
            & 0o7777;
        let mtime = header
            .mtime()
            .map_err(|e| decode_error(&source_path, "has an invalid mtime", e))?;

        tracing::trace!(from = %source_path.display(), to = %target.display(), ?entry_type, "rewriting entry");

        match entry_type {
            EntryType::Directory => append_directory(&mut builder, &target, mode, mtime)?,
            EntryType::Regular | EntryType::Continuous => {
                let size = header
                    .size()
                    .map_err(|e| decode_error(&source_path, "has an invalid size", e))?;
                let md5 = append_file(&mut builder, &mut entry, &source_path, &target, mode, mtime, size)?;

                summary.installed_bytes += size;
                summary.checksums.push(FileChecksum {
                    path: target.to_string_lossy().into_owned(),
                    md5,
                });
                if let Some(command) = top_level_command(relative.as_deref()) {
                    summary.commands.push(command);
                }
            }
            EntryType::Symlink => {
                let link = link_name(&entry, &source_path)?;
                append_link(&mut builder, EntryType::Symlink, &target, &link, mode, mtime)?;
            }
            EntryType::Link => {
                let link = link_name(&entry, &source_path)?;
                let link_target = match strip_top_level(&link, &mut top_level)? {
                    Some(rel) => Path::new(INSTALL_ROOT).join(rel),
                    None => PathBuf::from(INSTALL_ROOT),
                };
                append_link(&mut builder, EntryType::Link, &target, &link_target, mode, mtime)?;
            }
            EntryType::XGlobalHeader
            | EntryType::XHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink => {}
            other => {
                tracing::warn!(path = %source_path.display(), entry_type = ?other, "skipping unsupported entry");
            }
        }
    }

    if top_level.is_none() {
        return Err(GodebError::source_decode(
            "archive is empty",
            io::Error::from(io::ErrorKind::UnexpectedEof),
        ));
    }

    for command in &summary.commands {
        let link = Path::new(BIN_LINK_DIR).join(command);
        let target = Path::new(BIN_LINK_TARGET).join(command);
        append_link(&mut builder, EntryType::Symlink, &link, &target, 0o777, 0)?;
    }

    let sink = builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(output_error)?;

    tracing::debug!(
        files = summary.checksums.len(),
        bytes = summary.installed_bytes,
        commands = ?summary.commands,
        "payload written"
    );
    Ok((summary, sink))
}

/// Removes the archive's single top-level directory from `path`.
///
/// The first entry fixes the top-level name; a different one later on is an
/// error. Returns `None` for the top-level directory itself.
fn strip_top_level(
    path: &Path,
    top_level: &mut Option<OsString>,
) -> Result<Option<PathBuf>, GodebError> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => components.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(decode_error(
                    path,
                    "escapes the archive root",
                    io::Error::from(io::ErrorKind::InvalidData),
                ));
            }
        }
    }

    let Some((first, rest)) = components.split_first() else {
        return Err(decode_error(
            path,
            "has an empty name",
            io::Error::from(io::ErrorKind::InvalidData),
        ));
    };

    match top_level {
        None => *top_level = Some((*first).to_os_string()),
        Some(existing) if existing.as_os_str() != *first => {
            return Err(decode_error(
                path,
                &format!(
                    "is outside the top-level directory {}",
                    existing.to_string_lossy()
                ),
                io::Error::from(io::ErrorKind::InvalidData),
            ));
        }
        Some(_) => {}
    }

    if rest.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rest.iter().collect()))
    }
}

/// Returns the command name for files directly under the upstream `bin/`.
fn top_level_command(relative: Option<&Path>) -> Option<String> {
    let relative = relative?;
    let mut components = relative.components();
    match (components.next(), components.next(), components.next()) {
        (Some(Component::Normal(dir)), Some(Component::Normal(name)), None) if dir == "bin" => {
            Some(name.to_string_lossy().into_owned())
        }
        _ => None,
    }
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>, source_path: &Path) -> Result<PathBuf, GodebError> {
    entry
        .link_name()
        .map_err(|e| decode_error(source_path, "has an invalid link target", e))?
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| {
            decode_error(
                source_path,
                "is a link without a target",
                io::Error::from(io::ErrorKind::InvalidData),
            )
        })
}

/// A fresh header with ownership forced to `root:root`.
fn owned_header(entry_type: EntryType, mode: u32, mtime: u64, size: u64) -> Result<Header, GodebError> {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_mtime(mtime);
    header.set_size(size);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root").map_err(output_error)?;
    header.set_groupname("root").map_err(output_error)?;
    Ok(header)
}

fn append_directory<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &Path,
    mode: u32,
    mtime: u64,
) -> Result<(), GodebError> {
    let mut header = owned_header(EntryType::Directory, mode, mtime, 0)?;
    builder
        .append_data(&mut header, path, io::empty())
        .map_err(output_error)
}

fn append_link<W: Write>(
    builder: &mut tar::Builder<W>,
    entry_type: EntryType,
    path: &Path,
    target: &Path,
    mode: u32,
    mtime: u64,
) -> Result<(), GodebError> {
    let mut header = owned_header(entry_type, mode, mtime, 0)?;
    builder
        .append_link(&mut header, path, target)
        .map_err(output_error)
}

/// Copies one regular file and returns its MD5.
fn append_file<W: Write, R: Read>(
    builder: &mut tar::Builder<W>,
    data: R,
    source_path: &Path,
    target: &Path,
    mode: u32,
    mtime: u64,
    size: u64,
) -> Result<String, GodebError> {
    let mut header = owned_header(EntryType::Regular, mode, mtime, size)?;
    let mut reader = DigestReader::new(data, size);

    if let Err(e) = builder.append_data(&mut header, target, &mut reader) {
        return Err(if reader.read_failed {
            decode_error(source_path, "is truncated or corrupt", e)
        } else {
            output_error(e)
        });
    }

    Ok(format!("{:x}", reader.context.compute()))
}

/// Hashes bytes as they are read and fails if the entry ends early.
struct DigestReader<R> {
    inner: R,
    context: md5::Context,
    remaining: u64,
    read_failed: bool,
}

impl<R: Read> DigestReader<R> {
    fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            context: md5::Context::new(),
            remaining: size,
            read_failed: false,
        }
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) if self.remaining > 0 && !buf.is_empty() => {
                self.read_failed = true;
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("entry ended with {} bytes missing", self.remaining),
                ))
            }
            Ok(n) => {
                self.context.consume(&buf[..n]);
                self.remaining = self.remaining.saturating_sub(n as u64);
                Ok(n)
            }
            Err(e) => {
                self.read_failed = true;
                Err(e)
            }
        }
    }
}

fn decode_error(path: &Path, what: &str, source: io::Error) -> GodebError {
    GodebError::source_decode(format!("entry {} {what}", path.display()), source)
}

fn output_error(source: io::Error) -> GodebError {
    GodebError::output_write(PAYLOAD_LABEL, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deb::testing::{TarFixture, cut_tar_mid_entry, lcg_bytes};

    fn rewrite(bytes: &[u8]) -> Result<(PayloadSummary, Vec<u8>), GodebError> {
        write_payload(bytes, Vec::new())
    }

    fn entries_of(payload: &[u8]) -> Vec<(String, EntryType, u64, Option<String>)> {
        let mut archive = tar::Archive::new(GzDecoder::new(payload));
        archive
            .entries()
            .expect("Should read entries")
            .map(|entry| {
                let entry = entry.expect("Should read entry");
                let header = entry.header();
                assert_eq!(header.uid().expect("uid"), 0);
                assert_eq!(header.gid().expect("gid"), 0);
                assert_eq!(header.username().ok().flatten(), Some("root"));
                (
                    entry
                        .path()
                        .expect("path")
                        .to_string_lossy()
                        .trim_end_matches('/')
                        .to_string(),
                    header.entry_type(),
                    header.size().expect("size"),
                    entry
                        .link_name()
                        .expect("link")
                        .map(|l| l.to_string_lossy().into_owned()),
                )
            })
            .collect()
    }

    #[test]
    fn entries_are_rerooted_and_owned_by_root() {
        let source = TarFixture::new()
            .dir("go/")
            .file("go/VERSION", b"go1.2", 0o644)
            .dir("go/bin/")
            .file("go/bin/go", b"#!binary", 0o755)
            .symlink("go/misc/latest", "../VERSION")
            .finish();

        let (summary, payload) = rewrite(&source).expect("Should rewrite");
        let entries = entries_of(&payload);
        let paths: Vec<&str> = entries.iter().map(|e| e.0.as_str()).collect();

        assert_eq!(
            paths,
            [
                "usr",
                "usr/local",
                "usr/bin",
                "usr/local/go",
                "usr/local/go/VERSION",
                "usr/local/go/bin",
                "usr/local/go/bin/go",
                "usr/local/go/misc/latest",
                "usr/bin/go",
            ]
        );
        assert_eq!(entries[7].3.as_deref(), Some("../VERSION"));
        assert_eq!(entries[8].1, EntryType::Symlink);
        assert_eq!(entries[8].3.as_deref(), Some("../local/go/bin/go"));
        assert_eq!(summary.installed_bytes, 5 + 8);
        assert_eq!(summary.commands, ["go"]);
    }

    #[test]
    fn checksums_cover_regular_files_only() {
        let source = TarFixture::new()
            .file("go/bin/gofmt", b"hello world\n", 0o755)
            .symlink("go/bin/link", "gofmt")
            .finish();

        let (summary, _) = rewrite(&source).expect("Should rewrite");

        assert_eq!(
            summary.checksums,
            [FileChecksum {
                path: "usr/local/go/bin/gofmt".to_string(),
                md5: "6f5902ac237024bdd0c176cb93063dc4".to_string(),
            }]
        );
    }

    #[test]
    fn hard_links_are_rerooted() {
        let source = TarFixture::new()
            .file("go/pkg/tool/compile", b"x", 0o755)
            .hard_link("go/pkg/tool/compile2", "go/pkg/tool/compile")
            .finish();

        let (_, payload) = rewrite(&source).expect("Should rewrite");
        let entries = entries_of(&payload);
        let link = entries.iter().find(|e| e.1 == EntryType::Link).expect("Should keep link");
        assert_eq!(link.0, "usr/local/go/pkg/tool/compile2");
        assert_eq!(link.3.as_deref(), Some("usr/local/go/pkg/tool/compile"));
    }

    #[test]
    fn modes_are_preserved() {
        let source = TarFixture::new()
            .file("go/bin/go", b"x", 0o755)
            .file("go/README.md", b"y", 0o600)
            .finish();

        let (_, payload) = rewrite(&source).expect("Should rewrite");
        let mut archive = tar::Archive::new(GzDecoder::new(payload.as_slice()));
        let modes: Vec<(String, u32)> = archive
            .entries()
            .expect("entries")
            .filter_map(Result::ok)
            .filter(|e| e.header().entry_type() == EntryType::Regular)
            .map(|e| {
                (
                    e.path().expect("path").to_string_lossy().into_owned(),
                    e.header().mode().expect("mode"),
                )
            })
            .collect();
        assert_eq!(
            modes,
            [
                ("usr/local/go/bin/go".to_string(), 0o755),
                ("usr/local/go/README.md".to_string(), 0o600),
            ]
        );
    }

    #[test]
    fn second_top_level_directory_is_rejected() {
        let source = TarFixture::new()
            .file("go/VERSION", b"1", 0o644)
            .file("other/VERSION", b"2", 0o644)
            .finish();

        let err = rewrite(&source).unwrap_err();
        assert!(matches!(err, GodebError::SourceDecode { ref message, .. } if message.contains("other/VERSION")));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let source = TarFixture::new()
            .raw_file("go/../../etc/passwd", b"root")
            .finish();

        let err = rewrite(&source).unwrap_err();
        assert!(matches!(err, GodebError::SourceDecode { ref message, .. } if message.contains("escapes")));
    }

    #[test]
    fn truncated_gzip_is_a_decode_error() {
        let source = TarFixture::new()
            .file("go/bin/go", &lcg_bytes(64 * 1024), 0o755)
            .finish();
        let truncated = &source[..source.len() / 2];

        let err = rewrite(truncated).unwrap_err();
        assert!(matches!(err, GodebError::SourceDecode { .. }), "got {err:?}");
    }

    #[test]
    fn entry_cut_short_inside_valid_gzip_is_a_decode_error() {
        let source = TarFixture::new()
            .file("go/bin/go", &lcg_bytes(64 * 1024), 0o755)
            .finish();
        let source = cut_tar_mid_entry(&source, 512 + 10_000);

        let (message, source) = match rewrite(&source).unwrap_err() {
            GodebError::SourceDecode { message, source } => (message, source),
            other => panic!("expected a decode error, got {other:?}"),
        };
        assert_eq!(message, "entry go/bin/go is truncated or corrupt");
        assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
        assert!(source.to_string().contains("bytes missing"), "got {source}");
    }

    #[test]
    fn corrupt_mtime_is_a_decode_error() {
        let source = TarFixture::new()
            .dir("go/")
            .corrupt_mtime("go/VERSION", b"go1.2")
            .finish();

        let err = rewrite(&source).unwrap_err();
        assert!(
            matches!(err, GodebError::SourceDecode { ref message, .. } if message == "entry go/VERSION has an invalid mtime"),
            "got {err:?}"
        );
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = rewrite(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, GodebError::SourceDecode { .. }), "got {err:?}");
    }

    #[test]
    fn empty_archive_is_a_decode_error() {
        let source = TarFixture::new().finish();
        let err = rewrite(&source).unwrap_err();
        assert!(matches!(err, GodebError::SourceDecode { ref message, .. } if message.contains("empty")));
    }

    #[test]
    fn top_level_command_only_matches_direct_bin_children() {
        assert_eq!(top_level_command(Some(Path::new("bin/go"))), Some("go".to_string()));
        assert_eq!(top_level_command(Some(Path::new("pkg/tool/compile"))), None);
        assert_eq!(top_level_command(Some(Path::new("bin"))), None);
        assert_eq!(top_level_command(None), None);
    }
}
