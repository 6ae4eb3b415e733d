//! SHA-256 verification of downloaded tarballs against the release listing.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::errors::GodebError;

/// Checks `archive` against the hex digest advertised by the listing.
///
/// Case is ignored on the expected side.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, or a
/// [`GodebError::ChecksumMismatch`] if the digest differs.
pub fn verify_checksum(archive: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(archive)?;
    let expected = expected.trim().to_ascii_lowercase();

    if actual == expected {
        tracing::debug!(archive = %archive.display(), "checksum verified");
        return Ok(());
    }
    Err(GodebError::checksum_mismatch(expected, actual))
        .with_context(|| format!("Download of {} is corrupted", archive.display()))
}

/// Lowercase hex SHA-256 of the file at `path`.
fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher)
        .with_context(|| format!("Cannot read {} for hashing", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

    fn hello_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Should create temp file");
        std::io::Write::write_all(&mut file, b"hello world\n").expect("Should write");
        file
    }

    #[test]
    fn digest_of_known_content() {
        let file = hello_file();
        assert_eq!(sha256_file(file.path()).expect("Should hash"), HELLO_SHA256);
    }

    #[test]
    fn uppercase_listing_digest_is_accepted() {
        let file = hello_file();
        verify_checksum(file.path(), &HELLO_SHA256.to_uppercase()).expect("Should verify");
    }

    #[test]
    fn mismatch_carries_both_digests() {
        let file = hello_file();
        let err = verify_checksum(file.path(), "deadbeef").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<GodebError>(),
            Some(GodebError::ChecksumMismatch { expected, actual })
                if expected == "deadbeef" && actual == HELLO_SHA256
        ));
    }

    #[test]
    fn missing_archive_is_an_error() {
        assert!(verify_checksum(Path::new("/nonexistent/go.tar.gz"), HELLO_SHA256).is_err());
    }
}
