//! Live top-50 acquisition: fresh cache, then each strategy in order, then
//! stale cache.

use crate::browser::{BrowserMode, BrowserStrategy, Capabilities, CHROMIUM_ENV};
use crate::bridge::SubprocessBridge;
use crate::config::RealtimeConfig;
use crate::fetcher::{ContentCheck, HttpTransport, PageFetcher, Transport};
use anyhow::Result;
use async_trait::async_trait;
use hotsearch_core::extract::{dedup_and_rank, parse_realtime};
use hotsearch_core::persist::{read_cache, write_cache};
use hotsearch_core::RealtimeEntry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

pub const TOP_N: usize = 50;

/// Rank order, first occurrence of each title, renumbered from 1, at most
/// `TOP_N`. Cache reads go through this as well as strategy output.
fn top_n(mut raw: Vec<RealtimeEntry>) -> Vec<RealtimeEntry> {
    raw.sort_by_key(|e| e.rank);
    dedup_and_rank(raw.into_iter().map(|e| e.title)).into_iter().take(TOP_N).collect()
}

/// One way of obtaining the live ranking. Failures come back as an empty list.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn acquire(&self) -> Vec<RealtimeEntry>;
}

/// Direct HTTP: warm up a cookie session on the front page, then try each
/// ranking endpoint until one passes the realtime content check.
pub struct HttpStrategy {
    transport: Arc<dyn Transport>,
    fetcher: PageFetcher,
    front_page: String,
    endpoints: Vec<String>,
}

impl HttpStrategy {
    pub fn new(transport: Arc<dyn Transport>, config: &RealtimeConfig) -> Self {
        Self {
            fetcher: PageFetcher::new(transport.clone(), config.fetch.clone()),
            transport,
            front_page: config.front_page.clone(),
            endpoints: config.endpoints.clone(),
        }
    }

    async fn bootstrap(&self) {
        match self.transport.get(&self.front_page, self.fetcher.config().timeout).await {
            Ok(page) => debug!(url = %self.front_page, status = page.status, "session warm-up done"),
            Err(e) => warn!(url = %self.front_page, error = %e, "session warm-up failed"),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for HttpStrategy {
    fn name(&self) -> &str { "http" }

    async fn acquire(&self) -> Vec<RealtimeEntry> {
        self.bootstrap().await;
        for endpoint in &self.endpoints {
            let Some(html) = self.fetcher.fetch(endpoint, ContentCheck::Realtime).await else {
                continue;
            };
            let entries = parse_realtime(&html);
            if !entries.is_empty() {
                return entries;
            }
            warn!(url = %endpoint, "endpoint page held no ranking rows");
        }
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    FreshCache,
    Strategy(String),
    StaleCache,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub source: Source,
    pub entries: Vec<RealtimeEntry>,
}

pub struct RealtimeAcquirer {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
    cache_file: PathBuf,
    freshness: Duration,
    span: Span,
}

impl RealtimeAcquirer {
    pub fn new<P: AsRef<Path>>(cache_file: P, strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        let cache_file = cache_file.as_ref().to_path_buf();
        let span = info_span!("realtime", cache = %cache_file.display());
        Self { strategies, cache_file, freshness: crate::config::CACHE_FRESHNESS, span }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Builds the chain from the startup capability probe: the browser
    /// strategy is only present when a browser binary was found.
    pub fn from_config(config: &RealtimeConfig, caps: &Capabilities) -> Result<Self> {
        config.validate()?;
        let mut strategies: Vec<Box<dyn AcquisitionStrategy>> = Vec::new();
        match &caps.browser {
            Some(chrome) => {
                let mode = BrowserMode::detect(config.prefer_in_process_browser);
                let mut bridge_cfg = config.bridge.clone();
                bridge_cfg.args.extend(["--timeout-secs".to_string(), config.render_timeout.as_secs().to_string()]);
                let bridge = SubprocessBridge::from_config(&bridge_cfg)?.with_env(CHROMIUM_ENV, chrome);
                info!(?mode, browser = %chrome.display(), "browser strategy enabled");
                strategies.push(Box::new(BrowserStrategy::new(&config.page_url, chrome.clone(), mode, bridge, config.render_timeout)));
            }
            None => info!("no browser found, using direct HTTP only"),
        }
        strategies.push(Box::new(HttpStrategy::new(Arc::new(HttpTransport::new()?), config)));
        Ok(Self::new(&config.cache_file, strategies).with_freshness(config.freshness))
    }

    pub fn cache_file(&self) -> &Path { &self.cache_file }

    /// Top entries (at most 50); empty when nothing at all is available.
    pub async fn fetch_top50(&self, use_cache: bool) -> Vec<RealtimeEntry> {
        self.acquire(use_cache).await.entries
    }

    pub async fn acquire(&self, use_cache: bool) -> Acquisition {
        self.run_chain(use_cache).instrument(self.span.clone()).await
    }

    async fn run_chain(&self, use_cache: bool) -> Acquisition {
        if use_cache {
            if let Some(rec) = read_cache(&self.cache_file) {
                if rec.is_fresh(OffsetDateTime::now_utc(), self.freshness) {
                    info!(count = rec.count, timestamp = %rec.timestamp, "serving fresh cache");
                    return Acquisition { source: Source::FreshCache, entries: top_n(rec.data) };
                }
                debug!(timestamp = %rec.timestamp, "cache is stale");
            }
        }

        if let Some((name, entries)) = self.run_strategies().await {
            return Acquisition { source: Source::Strategy(name), entries };
        }

        if let Some(rec) = read_cache(&self.cache_file) {
            warn!(count = rec.count, timestamp = %rec.timestamp, "all strategies failed, serving stale cache");
            return Acquisition { source: Source::StaleCache, entries: top_n(rec.data) };
        }
        error!("all strategies failed and no cache exists");
        Acquisition { source: Source::Failed, entries: Vec::new() }
    }

    async fn run_strategies(&self) -> Option<(String, Vec<RealtimeEntry>)> {
        for strategy in &self.strategies {
            info!(strategy = strategy.name(), "trying strategy");
            let raw = strategy.acquire().await;
            if raw.is_empty() {
                warn!(strategy = strategy.name(), "strategy produced nothing");
                continue;
            }
            let entries = top_n(raw);
            info!(strategy = strategy.name(), count = entries.len(), "strategy succeeded");
            if let Err(e) = write_cache(&self.cache_file, &entries, OffsetDateTime::now_utc()) {
                warn!(error = %e, "failed to write realtime cache");
            }
            return Some((strategy.name().to_string(), entries));
        }
        None
    }

    /// Fresh fetch that ignores the cache entirely, saved to `output` in the
    /// cache record format.
    pub async fn fetch_and_save(&self, output: &Path) -> bool {
        let span = self.span.clone();
        async move {
            let Some((name, entries)) = self.run_strategies().await else {
                error!("fresh fetch failed, nothing saved");
                return false;
            };
            match write_cache(output, &entries, OffsetDateTime::now_utc()) {
                Ok(()) => {
                    info!(strategy = %name, count = entries.len(), path = %output.display(), "saved realtime snapshot");
                    true
                }
                Err(e) => {
                    error!(error = %e, path = %output.display(), "failed to save realtime snapshot");
                    false
                }
            }
        }
        .instrument(span)
        .await
    }
}
