//! Upstream Go release handling.
//!
//! ## Module Structure
//!
//! - [`platform`] - Target os/arch and the Debian architecture table
//! - [`version`] - Release identifier parsing and ordering
//! - [`catalog`] - Release listing fetching, filtering and version selection
//! - [`download`] - HTTP download with progress and retry
//! - [`verify`] - SHA-256 checksum verification

pub mod catalog;
pub mod download;
pub mod platform;
pub mod verify;
pub mod version;

pub use catalog::{Catalog, CatalogEntry, fetch_catalog};
pub use download::download_file;
pub use platform::Platform;
pub use verify::verify_checksum;
