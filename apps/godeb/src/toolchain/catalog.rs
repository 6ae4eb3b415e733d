//! Release catalog for upstream Go tarballs.
//!
//! The catalog is built from the JSON listing served by the Go download
//! site. Each release lists its files per os/arch; the catalog keeps the one
//! binary archive matching the target [`Platform`] and orders entries newest
//! first using [`ReleaseVersion`].
//!
//! ## Listing Format
//!
//! ```json
//! [
//!   {
//!     "version": "go1.22.1",
//!     "stable": true,
//!     "files": [
//!       {
//!         "filename": "go1.22.1.linux-amd64.tar.gz",
//!         "os": "linux",
//!         "arch": "amd64",
//!         "version": "go1.22.1",
//!         "sha256": "aab8e15785c997ae20f9c88422ee35d962c4562212bb0f879d052a35c8307c7f",
//!         "size": 68965341,
//!         "kind": "archive"
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! ## Data Source
//!
//! The listing server defaults to `https://go.dev` and archives are fetched
//! from `https://dl.google.com/go/`. Both can be overridden with the
//! `GODEB_DL_SERVER` and `GODEB_DOWNLOAD_BASE` environment variables for
//! mirrors or testing.

use serde::{Deserialize, Serialize};

use super::Platform;
use super::version::{ReleaseVersion, compare};
use crate::errors::GodebError;

/// Environment variable to override the listing server URL.
pub const DL_SERVER_ENV: &str = "GODEB_DL_SERVER";

/// Environment variable to override the archive download base URL.
pub const DOWNLOAD_BASE_ENV: &str = "GODEB_DOWNLOAD_BASE";

/// Default listing server.
const DEFAULT_DL_SERVER: &str = "https://go.dev";

/// Path of the JSON listing on the server.
const LISTING_PATH: &str = "/dl/?mode=json";

/// Default base URL that archive file names are appended to.
const DEFAULT_DOWNLOAD_BASE: &str = "https://dl.google.com/go/";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("godeb/", env!("CARGO_PKG_VERSION"));

/// File kind of binary distribution tarballs in the listing.
const ARCHIVE_KIND: &str = "archive";

/// One downloadable file of a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseFile {
    /// File name relative to the download base.
    pub filename: String,
    /// Go OS name; empty for source tarballs.
    #[serde(default)]
    pub os: String,
    /// Go architecture name; empty for source tarballs.
    #[serde(default)]
    pub arch: String,
    /// Version with its `go` prefix.
    #[serde(default)]
    pub version: String,
    /// SHA-256 of the file.
    #[serde(default)]
    pub sha256: String,
    /// `archive`, `installer` or `source`.
    #[serde(default)]
    pub kind: String,
}

/// One release in the listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Version with its `go` prefix (e.g., `go1.22.1`).
    pub version: String,
    /// Whether upstream marks the release as stable.
    #[serde(default)]
    pub stable: bool,
    /// Files published for this release.
    #[serde(default)]
    pub files: Vec<ReleaseFile>,
}

impl Release {
    /// Finds the binary archive for a platform.
    #[must_use]
    pub fn archive_for(&self, platform: &Platform) -> Option<&ReleaseFile> {
        self.files.iter().find(|f| {
            f.os == platform.os
                && f.arch == platform.arch
                && (f.kind.is_empty() || f.kind == ARCHIVE_KIND)
        })
    }
}

/// A release archive available for the target platform.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Upstream version without the `go` prefix (e.g., `1.22.1`).
    pub version: String,
    /// Download URL of the tarball.
    pub url: String,
    /// Published SHA-256; empty when upstream did not provide one.
    pub sha256: String,
    /// Whether upstream marks the release as stable.
    pub stable: bool,
}

/// Platform-specific release archives, newest first.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Builds a catalog from a decoded listing.
    ///
    /// Releases without an archive for `platform` are skipped.
    #[must_use]
    pub fn from_releases(releases: &[Release], platform: &Platform, download_base: &str) -> Self {
        let base = download_base.trim_end_matches('/');
        let entries = releases
            .iter()
            .filter_map(|release| {
                let file = release.archive_for(platform)?;
                let version = if file.version.is_empty() {
                    &release.version
                } else {
                    &file.version
                };
                Some(CatalogEntry {
                    version: version.trim_start_matches("go").to_string(),
                    url: format!("{base}/{}", file.filename),
                    sha256: file.sha256.clone(),
                    stable: release.stable,
                })
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Builds a catalog from entries in any order.
    #[must_use]
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        sort_newest_first(&mut entries);
        Self { entries }
    }

    /// Entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Returns `true` if no archive exists for the platform.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a catalog restricted to stable releases.
    #[must_use]
    pub fn stable_only(&self) -> Self {
        Self {
            entries: self.entries.iter().filter(|e| e.stable).cloned().collect(),
        }
    }

    /// Selects an entry, see [`select`].
    ///
    /// # Errors
    ///
    /// Returns [`GodebError::VersionNotFound`] if nothing matches.
    pub fn select(&self, requested: Option<&str>) -> Result<&CatalogEntry, GodebError> {
        select(&self.entries, requested)
    }
}

/// Sorts entries newest first. The sort is stable, so equal versions keep
/// their listing order.
pub fn sort_newest_first(entries: &mut [CatalogEntry]) {
    entries.sort_by_cached_key(|e| std::cmp::Reverse(ReleaseVersion::parse(&e.version)));
}

/// Picks a catalog entry.
///
/// With no `requested` version the newest entry wins. Otherwise the entry
/// whose version string equals `requested` exactly is returned; `1.1` never
/// matches `1.1.2` or `1.1rc1`.
///
/// # Errors
///
/// Returns [`GodebError::VersionNotFound`] if the catalog is empty or the
/// requested version is absent.
pub fn select<'a>(
    entries: &'a [CatalogEntry],
    requested: Option<&str>,
) -> Result<&'a CatalogEntry, GodebError> {
    match requested {
        None => {
            let mut ordered: Vec<&CatalogEntry> = entries.iter().collect();
            ordered.sort_by(|a, b| compare(&b.version, &a.version));
            ordered
                .first()
                .copied()
                .ok_or_else(|| GodebError::version_not_found("latest"))
        }
        Some(version) => entries
            .iter()
            .find(|e| e.version == version)
            .ok_or_else(|| GodebError::version_not_found(version)),
    }
}

/// Reads an override from the environment, treating empty or whitespace-only
/// values as unset.
fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns the URL of the JSON listing.
///
/// `include_all` adds archived and unstable releases.
#[must_use]
pub fn listing_url(include_all: bool) -> String {
    let server = env_override(DL_SERVER_ENV).unwrap_or_else(|| DEFAULT_DL_SERVER.to_string());
    let server = server.trim_end_matches('/');
    let mut url = format!("{server}{LISTING_PATH}");
    if include_all {
        url.push_str("&include=all");
    }
    url
}

/// Returns the base URL archive file names are resolved against.
#[must_use]
pub fn download_base() -> String {
    env_override(DOWNLOAD_BASE_ENV).unwrap_or_else(|| DEFAULT_DOWNLOAD_BASE.to_string())
}

/// Describes a non-success HTTP status.
fn describe_http_status(status: reqwest::StatusCode) -> String {
    match status.as_u16() {
        404 => "release listing not found (404)".to_string(),
        code if code >= 500 => format!("server error ({code})"),
        code => format!("HTTP error {code}"),
    }
}

/// Decodes the JSON listing.
///
/// # Errors
///
/// Returns [`GodebError::CatalogDecode`] if `body` is not a valid listing.
pub fn parse_listing(body: &str, url: &str) -> Result<Vec<Release>, GodebError> {
    serde_json::from_str(body).map_err(|source| GodebError::CatalogDecode {
        url: url.to_string(),
        source,
    })
}

/// Fetches the listing and builds the catalog for `platform`.
///
/// # Errors
///
/// Returns [`GodebError::CatalogFetch`] on transport failures or non-success
/// status codes, and [`GodebError::CatalogDecode`] on malformed JSON.
pub async fn fetch_catalog(platform: &Platform, include_all: bool) -> Result<Catalog, GodebError> {
    fetch_catalog_from(&listing_url(include_all), platform, &download_base()).await
}

/// Fetches the listing at `url`, resolving archives against `download_base`.
///
/// # Errors
///
/// Same as [`fetch_catalog`].
pub async fn fetch_catalog_from(
    url: &str,
    platform: &Platform,
    download_base: &str,
) -> Result<Catalog, GodebError> {
    tracing::debug!(%url, %platform, "fetching release listing");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            GodebError::catalog_fetch_with_source(url, "cannot create HTTP client", Box::new(e))
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        GodebError::catalog_fetch_with_source(url, "request failed", Box::new(e))
    })?;

    if !response.status().is_success() {
        return Err(GodebError::catalog_fetch(
            url,
            describe_http_status(response.status()),
        ));
    }

    let body = response.text().await.map_err(|e| {
        GodebError::catalog_fetch_with_source(url, "cannot read response body", Box::new(e))
    })?;

    let releases = parse_listing(&body, url)?;
    let catalog = Catalog::from_releases(&releases, platform, download_base);
    tracing::info!(
        releases = releases.len(),
        archives = catalog.entries().len(),
        "release listing loaded"
    );
    Ok(catalog)
}
