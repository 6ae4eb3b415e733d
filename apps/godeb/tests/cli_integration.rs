#![warn(clippy::pedantic)]

//! Integration tests for the godeb CLI.
//!
//! These tests spawn the compiled `godeb` binary and check its stdout,
//! stderr, exit code and the files it leaves behind.
//!
//! ## Test Strategy
//!
//! 1. **Help**: subcommands and options are documented
//! 2. **Error handling**: unreachable servers, unsupported architectures
//! 3. **End to end**: a `wiremock` server stands in for the Go download
//!    site, and `download` must produce a valid package or nothing at all
//!
//! ## Test Infrastructure
//!
//! - `assert_cmd` spawns the binary
//! - `assert_fs` provides scratch output directories
//! - `predicates` matches output
//! - `wiremock` serves the release listing and tarballs

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use sha2::{Digest, Sha256};
use std::process::Command;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Address that refuses connections.
const UNREACHABLE_SERVER: &str = "http://127.0.0.1:1";

fn godeb() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("godeb"));
    cmd.env_remove("GODEB_OS")
        .env_remove("GODEB_ARCH")
        .env_remove("RUST_LOG");
    cmd
}

/// A minimal upstream tarball: `go/VERSION` and `go/bin/go`.
fn upstream_tarball() -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (path, data, mode) in [
        ("go/VERSION", &b"go1.2"[..], 0o644),
        ("go/bin/go", &b"\x7fELF fake binary"[..], 0o755),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_uid(1000);
        header.set_gid(1000);
        builder
            .append_data(&mut header, path, data)
            .expect("Should append entry");
    }
    builder
        .into_inner()
        .expect("Should finish tar")
        .finish()
        .expect("Should finish gzip")
}

/// Mounts a one-release listing and its tarball on a mock server.
///
/// The listing advertises `sha256`, which may be deliberately wrong.
async fn release_server(tarball: Vec<u8>, sha256: &str) -> MockServer {
    let listing = serde_json::json!([{
        "version": "go1.2",
        "stable": true,
        "files": [{
            "filename": "go1.2.linux-amd64.tar.gz",
            "os": "linux",
            "arch": "amd64",
            "version": "go1.2",
            "sha256": sha256,
            "size": tarball.len(),
            "kind": "archive"
        }]
    }]);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/"))
        .and(query_param("mode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/go1.2.linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
        .mount(&server)
        .await;
    server
}

/// `godeb` pointed at `server` for both the listing and the archives.
fn godeb_against(server: &MockServer) -> Command {
    let mut cmd = godeb();
    cmd.env("GODEB_DL_SERVER", server.uri())
        .env("GODEB_DOWNLOAD_BASE", format!("{}/go/", server.uri()));
    cmd
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// -----------------------------------------------------------------------------
// Help
// -----------------------------------------------------------------------------

/// Verifies that `godeb --help` lists every subcommand.
#[test]
fn help_shows_available_commands() {
    godeb()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("download"))
                .and(predicate::str::contains("install"))
                .and(predicate::str::contains("remove"))
                .and(predicate::str::contains("GODEB_DL_SERVER")),
        );
}

#[test]
fn download_help_shows_options() {
    godeb()
        .args(["download", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--prerelease")
                .and(predicate::str::contains("--output-dir"))
                .and(predicate::str::contains("[VERSION]")),
        );
}

#[test]
fn list_help_shows_options() {
    godeb()
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--all").and(predicate::str::contains("--json")));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    godeb().assert().failure().code(2);
}

// -----------------------------------------------------------------------------
// Error handling
// -----------------------------------------------------------------------------

/// **Expected behavior**: exit 1 with the listing URL in the message.
#[test]
fn list_without_network_shows_error() {
    godeb()
        .env("GODEB_DL_SERVER", UNREACHABLE_SERVER)
        .args(["--os", "linux", "--arch", "amd64", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to fetch release listing"));
}

#[test]
fn download_without_network_leaves_no_package() {
    let temp = assert_fs::TempDir::new().unwrap();

    godeb()
        .env("GODEB_DL_SERVER", UNREACHABLE_SERVER)
        .args(["--os", "linux", "--arch", "amd64", "download", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"));

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

/// **Expected behavior**: rejected before any network access, so the
/// unreachable server never matters.
#[test]
fn download_unsupported_architecture_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    godeb()
        .current_dir(temp.path())
        .env("GODEB_DL_SERVER", UNREACHABLE_SERVER)
        .args(["--os", "linux", "--arch", "sparc64", "download"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unsupported architecture: sparc64"))
        .stdout(predicate::str::contains("Fetching").not());

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn architecture_can_come_from_environment() {
    godeb()
        .env("GODEB_ARCH", "mips")
        .env("GODEB_DL_SERVER", UNREACHABLE_SERVER)
        .args(["--os", "linux", "download"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported architecture: mips"));
}

// -----------------------------------------------------------------------------
// End to end against a local listing server
// -----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn list_prints_versions_from_server() {
    let tarball = upstream_tarball();
    let sha = sha256_hex(&tarball);
    let server = release_server(tarball, &sha).await;

    godeb_against(&server)
        .args(["--os", "linux", "--arch", "amd64", "list"])
        .assert()
        .success()
        .stdout("1.2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn list_reports_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dl/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    godeb_against(&server)
        .args(["--os", "linux", "--arch", "amd64", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(
            predicate::str::contains("failed to fetch release listing")
                .and(predicate::str::contains("server error (503)")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn download_builds_package_from_server() {
    let tarball = upstream_tarball();
    let sha = sha256_hex(&tarball);
    let server = release_server(tarball, &sha).await;
    let temp = assert_fs::TempDir::new().unwrap();

    godeb_against(&server)
        .args(["--os", "linux", "--arch", "amd64", "download", "-o"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("go_1.2-godeb1_amd64.deb ready"));

    let package = temp.child("go_1.2-godeb1_amd64.deb");
    package.assert(predicate::path::is_file());
    let bytes = std::fs::read(package.path()).unwrap();
    assert!(bytes.starts_with(b"!<arch>\ndebian-binary   "));
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn checksum_mismatch_leaves_no_package() {
    let server = release_server(upstream_tarball(), &"0".repeat(64)).await;
    let temp = assert_fs::TempDir::new().unwrap();

    godeb_against(&server)
        .args(["--os", "linux", "--arch", "amd64", "download", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("checksum mismatch"));

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_version_is_reported() {
    let tarball = upstream_tarball();
    let sha = sha256_hex(&tarball);
    let server = release_server(tarball, &sha).await;

    godeb_against(&server)
        .args(["--os", "linux", "--arch", "amd64", "download", "1.1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("go version 1.1 not found"));
}
