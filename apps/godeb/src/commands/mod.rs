//! Command modules for the godeb CLI.
//!
//! - [`list`] - List available Go versions
//! - [`download`] - Download a release and build its `.deb`
//! - [`install`] - Build a `.deb` and install it with dpkg
//! - [`remove`] - Purge the installed package

pub mod download;
pub mod install;
pub mod list;
pub mod remove;
