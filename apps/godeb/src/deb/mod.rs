//! Debian package transcoding.
//!
//! ## Module Structure
//!
//! - [`ar`] - Unix `ar` container framing
//! - [`control`] - `control.tar.gz`: package fields and `md5sums`
//! - [`payload`] - `data.tar.gz`: the re-rooted upstream tree
//! - [`builder`] - Member assembly and atomic output

pub mod ar;
pub mod builder;
pub mod control;
pub mod payload;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{DebBuilder, build_package};
