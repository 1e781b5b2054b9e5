use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const ARCHIVE_BASE_URL: &str = "https://weibo-trending-hot-history.vercel.app/hots";
pub const LIVE_FRONT_PAGE: &str = "https://weibo.com/";
pub const LIVE_PAGE: &str = "https://s.weibo.com/top/summary?cate=realtimehot";
pub const LIVE_ENDPOINTS: &[&str] = &[
    "https://s.weibo.com/top/summary?cate=realtimehot",
    "https://s.weibo.com/top/summary",
    "https://s.weibo.com/top/summary?cate=socialevent",
];
pub const DEFAULT_CACHE_FILE: &str = "data/realtime_cache.json";
pub const CACHE_FRESHNESS: Duration = Duration::from_secs(60 * 60);

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// Retry policy shared by every page fetch. Attempt `n` (0-based) that fails
/// is followed by a pause of `backoff_base * 2^n`.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(10), max_retries: 3, backoff_base: Duration::from_secs(1) }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub output_dir: PathBuf,
    /// Pause between fetch and parse; half of it is also inserted between dates.
    pub delay: Duration,
    pub fetch: FetchConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: ARCHIVE_BASE_URL.to_string(),
            output_dir: PathBuf::from("data"),
            delay: Duration::from_secs(1),
            fetch: FetchConfig::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url).with_context(|| format!("invalid archive base url {:?}", self.base_url))?;
        Ok(())
    }
}

/// How the isolated browser worker is launched. `program = None` means this
/// executable, re-invoked with `args` (the hidden `render` subcommand).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { program: None, args: vec!["render".to_string()], timeout: Duration::from_secs(120) }
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub cache_file: PathBuf,
    pub freshness: Duration,
    pub page_url: String,
    pub front_page: String,
    pub endpoints: Vec<String>,
    pub fetch: FetchConfig,
    pub render_timeout: Duration,
    pub prefer_in_process_browser: bool,
    pub bridge: BridgeConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            freshness: CACHE_FRESHNESS,
            page_url: LIVE_PAGE.to_string(),
            front_page: LIVE_FRONT_PAGE.to_string(),
            endpoints: LIVE_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            fetch: FetchConfig { timeout: Duration::from_secs(30), ..FetchConfig::default() },
            render_timeout: Duration::from_secs(90),
            prefer_in_process_browser: false,
            bridge: BridgeConfig::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn validate(&self) -> Result<()> {
        for u in std::iter::once(&self.page_url).chain(std::iter::once(&self.front_page)).chain(&self.endpoints) {
            Url::parse(u).with_context(|| format!("invalid realtime url {u:?}"))?;
        }
        if self.render_timeout >= self.bridge.timeout {
            tracing::warn!(
                render_secs = self.render_timeout.as_secs(),
                bridge_secs = self.bridge.timeout.as_secs(),
                "render timeout is not below the worker timeout"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ArchiveConfig::default().validate().unwrap();
        RealtimeConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_urls() {
        let cfg = ArchiveConfig { base_url: "not a url".into(), ..ArchiveConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
