//! Headless Chromium rendering of the live ranking page.

use crate::bridge::SubprocessBridge;
use crate::realtime::AcquisitionStrategy;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hotsearch_core::extract::parse_realtime;
use hotsearch_core::RealtimeEntry;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Set by hosts whose own runtime cannot drive a browser in-process.
pub const HOST_RUNTIME_ENV: &str = "HOTSEARCH_HOST_RUNTIME";
pub const CHROMIUM_ENV: &str = "HOTSEARCH_CHROMIUM";
const CHROME_BIN_ENV: &str = "CHROME_BIN";
const CANDIDATES: &[&str] = &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"];
const STDERR_TAIL: usize = 400;

/// Explicit overrides first, then well-known names on `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    for var in [CHROMIUM_ENV, CHROME_BIN_ENV] {
        if let Ok(p) = std::env::var(var) {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
            debug!(var, path = %p, "browser override does not exist");
        }
    }
    CANDIDATES.iter().find_map(|name| which::which(name).ok())
}

/// What this host can do, probed once at startup.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub browser: Option<PathBuf>,
}

impl Capabilities {
    pub fn probe() -> Self {
        let browser = find_chromium();
        match &browser {
            Some(p) => info!(browser = %p.display(), "headless browser available"),
            None => info!("no headless browser found"),
        }
        Self { browser }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserMode {
    InProcess,
    Isolated,
}

impl BrowserMode {
    pub fn detect(prefer_in_process: bool) -> Self {
        Self::select(prefer_in_process, std::env::var_os(HOST_RUNTIME_ENV).is_some())
    }

    /// A host runtime marker always forces the isolated worker.
    pub fn select(prefer_in_process: bool, host_runtime: bool) -> Self {
        if prefer_in_process && !host_runtime {
            BrowserMode::InProcess
        } else {
            BrowserMode::Isolated
        }
    }
}

/// Loads `url` in a throwaway profile and returns the serialized DOM after
/// scripts have had a virtual-time budget to run.
pub async fn dump_dom(chrome: &Path, url: &str, timeout: Duration) -> Result<String> {
    let profile = tempfile::tempdir().context("creating browser profile dir")?;
    let child = Command::new(chrome)
        .args([
            "--headless",
            "--no-sandbox",
            "--disable-gpu",
            "--disable-dev-shm-usage",
            "--virtual-time-budget=15000",
            &format!("--user-data-dir={}", profile.path().display()),
            "--dump-dom",
            url,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("launching {}", chrome.display()))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .with_context(|| format!("browser timed out after {}s", timeout.as_secs()))??;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.chars().rev().take(STDERR_TAIL).collect::<Vec<_>>().into_iter().rev().collect();
        bail!("browser exited with {}: {}", output.status, tail.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub async fn render_entries(chrome: &Path, url: &str, timeout: Duration) -> Result<Vec<RealtimeEntry>> {
    let html = dump_dom(chrome, url, timeout).await?;
    debug!(url, bytes = html.len(), "rendered page");
    Ok(parse_realtime(&html))
}

/// Worker side of the isolated mode: render, extract, write the entries as a
/// JSON array to `output`.
pub async fn render_to_file(url: &str, output: &Path, timeout: Duration) -> Result<usize> {
    let chrome = find_chromium().context("no headless browser available")?;
    let entries = render_entries(&chrome, url, timeout).await?;
    if entries.is_empty() {
        bail!("rendered page held no ranking rows");
    }
    let json = serde_json::to_string(&entries)?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    Ok(entries.len())
}

pub struct BrowserStrategy {
    url: String,
    chrome: PathBuf,
    mode: BrowserMode,
    bridge: SubprocessBridge,
    render_timeout: Duration,
}

impl BrowserStrategy {
    pub fn new(url: &str, chrome: PathBuf, mode: BrowserMode, bridge: SubprocessBridge, render_timeout: Duration) -> Self {
        Self { url: url.to_string(), chrome, mode, bridge, render_timeout }
    }

    pub fn mode(&self) -> BrowserMode { self.mode }
}

#[async_trait]
impl AcquisitionStrategy for BrowserStrategy {
    fn name(&self) -> &str { "browser" }

    async fn acquire(&self) -> Vec<RealtimeEntry> {
        match self.mode {
            BrowserMode::InProcess => match render_entries(&self.chrome, &self.url, self.render_timeout).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(url = %self.url, error = %e, "in-process render failed");
                    Vec::new()
                }
            },
            BrowserMode::Isolated => self.bridge.run(&self.url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_runtime_forces_isolation() {
        assert_eq!(BrowserMode::select(true, false), BrowserMode::InProcess);
        assert_eq!(BrowserMode::select(true, true), BrowserMode::Isolated);
        assert_eq!(BrowserMode::select(false, false), BrowserMode::Isolated);
        assert_eq!(BrowserMode::select(false, true), BrowserMode::Isolated);
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let err = dump_dom(Path::new("/nonexistent/chrome"), "https://example.com", Duration::from_secs(1)).await;
        assert!(err.is_err());
    }
}
