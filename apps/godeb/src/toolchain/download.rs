//! HTTP download of release tarballs.
//!
//! Archives are streamed into a `.part` file next to the destination and
//! renamed once complete, with a one-line progress meter on stdout.
//! Transient failures are retried by [`RetryPolicy`]; the package builder
//! itself never retries.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;

/// Request timeout. Go tarballs run to hundreds of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Minimum interval between progress redraws.
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

const USER_AGENT: &str = concat!("godeb/", env!("CARGO_PKG_VERSION"));

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (0-based), +/- 25%.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let quarter = base / 4;
        let jitter = rand::rng().random_range(Duration::ZERO..=quarter * 2);
        base - quarter + jitter
    }
}

/// Downloads `url` to `dest` using the default [`RetryPolicy`].
///
/// # Errors
///
/// Returns the last error if every attempt fails, or an error if the
/// completed file cannot be moved into place.
pub async fn download_file(url: &str, dest: &Path) -> Result<()> {
    download_with_policy(url, dest, RetryPolicy::default()).await
}

/// Downloads `url` to `dest`, retrying per `policy`.
///
/// # Errors
///
/// See [`download_file`].
pub async fn download_with_policy(url: &str, dest: &Path, policy: RetryPolicy) -> Result<()> {
    let part = part_path(dest);
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")?;

    let mut last_error = None;
    for attempt in 0..policy.attempts {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            println!("Retrying download (attempt {}/{})...", attempt + 1, policy.attempts);
            tracing::warn!(attempt, delay_ms = delay.as_millis(), "retrying download");
            tokio::time::sleep(delay).await;
        }

        match fetch_to(&client, url, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest).await.with_context(|| {
                    format!("Failed to move {} into place", dest.display())
                })?;
                tracing::debug!(%url, bytes, "download complete");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "download attempt failed");
                let _ = tokio::fs::remove_file(&part).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No download attempts were made for {url}")))
}

/// `<dest>.part`, keeping the full original file name.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// One GET into `path`; returns the number of bytes written.
async fn fetch_to(client: &reqwest::Client, url: &str, path: &Path) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("HTTP error {status}: {url}");
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut progress = Progress::new(response.content_length());
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read body of {url}"))?;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        progress.advance(chunk.len() as u64);
    }

    file.flush()
        .await
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    progress.finish();

    ensure_complete(url, progress.total, progress.received)?;
    Ok(progress.received)
}

/// Fails when the server announced more bytes than it sent.
fn ensure_complete(url: &str, expected: Option<u64>, received: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != received => {
            bail!("Download of {url} ended after {received} of {expected} bytes")
        }
        _ => Ok(()),
    }
}

/// Single-line transfer meter.
struct Progress {
    total: Option<u64>,
    received: u64,
    started: Instant,
    last_draw: Instant,
}

impl Progress {
    fn new(total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            total,
            received: 0,
            started: now,
            last_draw: now,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.received += bytes;
        if self.last_draw.elapsed() >= REDRAW_INTERVAL {
            self.draw();
            self.last_draw = Instant::now();
        }
    }

    fn finish(&self) {
        self.draw();
        println!();
    }

    fn draw(&self) {
        print!("\r{}     ", self.line(self.started.elapsed()));
        let _ = std::io::stdout().flush();
    }

    #[allow(clippy::cast_precision_loss)]
    fn line(&self, elapsed: Duration) -> String {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.received as f64 / secs
        } else {
            0.0
        };
        match self.total {
            Some(total) if total > 0 => format!(
                "{} / {} ({}%) {}/s",
                human_bytes(self.received),
                human_bytes(total),
                self.received.saturating_mul(100) / total,
                human_bytes_f(rate)
            ),
            _ => format!("{} {}/s", human_bytes(self.received), human_bytes_f(rate)),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn human_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else {
        human_bytes_f(bytes as f64)
    }
}

fn human_bytes_f(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
