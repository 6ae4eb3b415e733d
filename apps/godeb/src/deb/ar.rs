//! Unix `ar` container writer, the outer framing of a `.deb`.
//!
//! Layout: the 8-byte global magic, then for each member a 60-byte ASCII
//! header followed by the member bytes, padded with `\n` to an even length.
//!
//! ```text
//! offset  width  field
//!      0     16  name, space padded
//!     16     12  modification time (decimal)
//!     28      6  owner uid (decimal)
//!     34      6  owner gid (decimal)
//!     40      8  mode (octal)
//!     48     10  size in bytes (decimal)
//!     58      2  terminator "`\n"
//! ```

use std::io::{self, Read, Write};

/// Global header of every `ar` archive.
pub const MAGIC: &[u8; 8] = b"!<arch>\n";

/// Size of a member header.
pub const HEADER_LEN: usize = 60;

/// Regular file, `rw-r--r--`.
pub const DEFAULT_MODE: u32 = 0o100_644;

const NAME_WIDTH: usize = 16;
const MTIME_WIDTH: usize = 12;
const ID_WIDTH: usize = 6;
const MODE_WIDTH: usize = 8;
const SIZE_WIDTH: usize = 10;
const TERMINATOR: &[u8; 2] = b"`\n";
const PADDING: u8 = b'\n';

/// Header fields of one archive member.
///
/// Timestamps and ownership default to zero so identical inputs produce
/// identical containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHeader {
    /// Member name, truncated to 16 bytes when encoded.
    pub name: String,
    /// Modification time in seconds since the epoch.
    pub mtime: u64,
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    /// File mode.
    pub mode: u32,
    /// Payload length in bytes.
    pub size: u64,
}

impl MemberHeader {
    /// Header for a root-owned `0644` member with a zero timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mtime: 0,
            uid: 0,
            gid: 0,
            mode: DEFAULT_MODE,
            size,
        }
    }

    /// Encodes the 60-byte header.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a numeric field does not fit its width.
    pub fn encode(&self) -> io::Result<[u8; HEADER_LEN]> {
        let mut header = [b' '; HEADER_LEN];
        let mut offset = 0;

        let name = self.name.as_bytes();
        let name = &name[..name.len().min(NAME_WIDTH)];
        header[..name.len()].copy_from_slice(name);
        offset += NAME_WIDTH;

        for (value, width) in [
            (self.mtime.to_string(), MTIME_WIDTH),
            (self.uid.to_string(), ID_WIDTH),
            (self.gid.to_string(), ID_WIDTH),
            (format!("{:o}", self.mode), MODE_WIDTH),
            (self.size.to_string(), SIZE_WIDTH),
        ] {
            if value.len() > width {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("ar header field {value} of {} exceeds {width} bytes", self.name),
                ));
            }
            header[offset..offset + value.len()].copy_from_slice(value.as_bytes());
            offset += width;
        }

        header[offset..].copy_from_slice(TERMINATOR);
        Ok(header)
    }
}

/// Streams members into an `ar` container.
pub struct ArWriter<W: Write> {
    inner: W,
}

impl<W: Write> ArWriter<W> {
    /// Writes the global magic and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn new(mut inner: W) -> io::Result<Self> {
        inner.write_all(MAGIC)?;
        Ok(Self { inner })
    }

    /// Appends an in-memory member.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn append_bytes(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        self.append(&MemberHeader::new(name, data.len() as u64), data)
    }

    /// Appends a member whose payload is streamed from `data`.
    ///
    /// Exactly `header.size` bytes are copied.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if `data` ends early, or any error from the
    /// reader or the underlying writer.
    pub fn append<R: Read>(&mut self, header: &MemberHeader, data: R) -> io::Result<()> {
        self.inner.write_all(&header.encode()?)?;

        let copied = io::copy(&mut data.take(header.size), &mut self.inner)?;
        if copied != header.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "member {} ended after {copied} of {} bytes",
                    header.name, header.size
                ),
            ));
        }

        if header.size % 2 == 1 {
            self.inner.write_all(&[PADDING])?;
        }
        tracing::debug!(member = %header.name, size = header.size, "appended ar member");
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns any error from flushing.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Splits a container into member headers and payloads.
#[cfg(test)]
pub(crate) fn parse_members(bytes: &[u8]) -> io::Result<Vec<(MemberHeader, Vec<u8>)>> {
    fn field(raw: &[u8]) -> &str {
        std::str::from_utf8(raw).unwrap_or("").trim_end()
    }
    fn invalid(message: &str) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, message.to_string())
    }

    let rest = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| invalid("missing ar magic"))?;
    let mut members = Vec::new();
    let mut pos = 0;

    while pos < rest.len() {
        let raw = rest
            .get(pos..pos + HEADER_LEN)
            .ok_or_else(|| invalid("truncated header"))?;
        if &raw[58..60] != TERMINATOR {
            return Err(invalid("bad header terminator"));
        }
        let parse = |r: &[u8], radix| {
            u64::from_str_radix(field(r), radix).map_err(|_| invalid("bad numeric field"))
        };
        let header = MemberHeader {
            name: field(&raw[0..16]).to_string(),
            mtime: parse(&raw[16..28], 10)?,
            uid: u32::try_from(parse(&raw[28..34], 10)?).map_err(|_| invalid("uid"))?,
            gid: u32::try_from(parse(&raw[34..40], 10)?).map_err(|_| invalid("gid"))?,
            mode: u32::try_from(parse(&raw[40..48], 8)?).map_err(|_| invalid("mode"))?,
            size: parse(&raw[48..58], 10)?,
        };
        pos += HEADER_LEN;
        let size = usize::try_from(header.size).map_err(|_| invalid("size"))?;
        let data = rest
            .get(pos..pos + size)
            .ok_or_else(|| invalid("truncated member"))?
            .to_vec();
        pos += size + size % 2;
        members.push((header, data));
    }

    Ok(members)
}
