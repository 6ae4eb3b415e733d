//! List command for the godeb CLI.
//!
//! ## Usage
//!
//! ```bash
//! godeb list          # Stable releases for this platform, newest first
//! godeb list --all    # Include unstable and archived releases
//! godeb list --json   # Machine-readable output
//! ```

use anyhow::Result;
use clap::Args;

use crate::toolchain::{Catalog, Platform, fetch_catalog};

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Include unstable and archived releases.
    #[clap(long, short = 'a')]
    pub all: bool,

    /// Print versions in JSON format.
    #[clap(long, short = 'j')]
    pub json: bool,
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the release listing cannot be fetched or decoded.
pub async fn execute(args: &ListArgs, platform: &Platform) -> Result<()> {
    let catalog = fetch_catalog(platform, args.all).await?;
    let catalog = if args.all {
        catalog
    } else {
        catalog.stable_only()
    };

    if args.json {
        println!("{}", render_json(&catalog)?);
    } else {
        print!("{}", render_text(&catalog, platform));
    }
    Ok(())
}

fn render_json(catalog: &Catalog) -> Result<String> {
    Ok(serde_json::to_string_pretty(catalog.entries())?)
}

fn render_text(catalog: &Catalog, platform: &Platform) -> String {
    if catalog.is_empty() {
        return format!("No Go releases available for {platform}.\n");
    }
    catalog
        .entries()
        .iter()
        .map(|entry| format!("{}\n", entry.version))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::CatalogEntry;

    fn entry(version: &str, stable: bool) -> CatalogEntry {
        CatalogEntry {
            version: version.to_string(),
            url: format!("https://dl.example.com/go{version}.linux-amd64.tar.gz"),
            sha256: String::new(),
            stable,
        }
    }

    #[test]
    fn text_lists_one_version_per_line_newest_first() {
        let catalog = Catalog::from_entries(vec![
            entry("1.1", true),
            entry("1.2rc1", false),
            entry("1.1.2", true),
        ]);
        assert_eq!(
            render_text(&catalog, &Platform::new("linux", "amd64")),
            "1.2rc1\n1.1.2\n1.1\n"
        );
    }

    #[test]
    fn text_reports_empty_catalog() {
        let text = render_text(&Catalog::default(), &Platform::new("linux", "s390x"));
        assert_eq!(text, "No Go releases available for linux-s390x.\n");
    }

    #[test]
    fn json_includes_url_and_stability() {
        let catalog = Catalog::from_entries(vec![entry("1.2", true)]);
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&catalog).expect("Should render")).expect("json");
        assert_eq!(json[0]["version"], "1.2");
        assert_eq!(json[0]["stable"], true);
        assert!(json[0]["url"].as_str().expect("url").ends_with(".tar.gz"));
    }
}
