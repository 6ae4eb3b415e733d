//! Upstream-shaped tarballs for unit tests.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

/// Builds a gzip-compressed tarball entry by entry.
pub(crate) struct TarFixture {
    builder: tar::Builder<GzEncoder<Vec<u8>>>,
}

impl TarFixture {
    pub(crate) fn new() -> Self {
        Self {
            builder: tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast())),
        }
    }

    fn header(entry_type: EntryType, mode: u32, size: u64) -> Header {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header.set_uid(1000);
        header.set_gid(1000);
        header.set_mtime(1_700_000_000);
        header
    }

    pub(crate) fn dir(mut self, path: &str) -> Self {
        let mut header = Self::header(EntryType::Directory, 0o755, 0);
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .expect("Should append directory");
        self
    }

    pub(crate) fn file(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        let mut header = Self::header(EntryType::Regular, mode, data.len() as u64);
        self.builder
            .append_data(&mut header, path, data)
            .expect("Should append file");
        self
    }

    pub(crate) fn symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = Self::header(EntryType::Symlink, 0o777, 0);
        self.builder
            .append_link(&mut header, path, target)
            .expect("Should append symlink");
        self
    }

    pub(crate) fn hard_link(mut self, path: &str, target: &str) -> Self {
        let mut header = Self::header(EntryType::Link, 0o755, 0);
        self.builder
            .append_link(&mut header, path, target)
            .expect("Should append hard link");
        self
    }

    /// Appends a file whose name is written verbatim, bypassing the
    /// builder's path validation.
    pub(crate) fn raw_file(mut self, name: &str, data: &[u8]) -> Self {
        let mut header = Self::header(EntryType::Regular, 0o644, data.len() as u64);
        let slot = &mut header.as_old_mut().name;
        slot[..name.len()].copy_from_slice(name.as_bytes());
        header.set_cksum();
        self.builder.append(&header, data).expect("Should append raw file");
        self
    }

    /// Appends a regular file whose mtime field is not octal.
    pub(crate) fn corrupt_mtime(mut self, path: &str, data: &[u8]) -> Self {
        let mut header = Self::header(EntryType::Regular, 0o644, data.len() as u64);
        header.set_path(path).expect("Should set path");
        header.as_old_mut().mtime = *b"zzzzzzzzzzz\0";
        header.set_cksum();
        self.builder.append(&header, data).expect("Should append file");
        self
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip")
    }
}

/// Re-compresses the first `tar_len` bytes of the tar inside `gz`.
///
/// The result has intact gzip framing around a tar stream that stops
/// mid-entry.
pub(crate) fn cut_tar_mid_entry(gz: &[u8], tar_len: usize) -> Vec<u8> {
    let mut tar = Vec::new();
    flate2::read::GzDecoder::new(gz)
        .read_to_end(&mut tar)
        .expect("Should gunzip fixture");
    assert!(tar_len < tar.len(), "cut point is past the end of the tar");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&tar[..tar_len]).expect("Should gzip");
    encoder.finish().expect("Should finish gzip")
}

/// Deterministic incompressible bytes.
pub(crate) fn lcg_bytes(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 56) as u8
        })
        .collect()
}
