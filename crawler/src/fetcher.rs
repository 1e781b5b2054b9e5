use crate::config::{FetchConfig, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument, Span};

const ARCHIVE_MIN_BYTES: usize = 100;
const ARCHIVE_MARKERS: &[&str] = &["查看微博话题", "text-xl", "inline-flex"];
const NOT_FOUND_MARKERS: &[&str] = &["没有找到", "404"];
/// A genuine day page links every topic; a bare not-found page has a handful of anchors.
const MIN_ANCHORS: usize = 10;

const REALTIME_MIN_BYTES: usize = 1024;
const REALTIME_MARKERS: &[&str] = &["pl_top_realtimehot", "td-02", "realtimehot"];
const VISITOR_MARKERS: &[&str] = &["passport.weibo.com/visitor", "Sina Visitor System", "visitor/visitor"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// reqwest client with browser-like headers and a cookie jar, so a warm-up
/// request can establish a session for later requests.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static(ACCEPT_LANGUAGE));
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let resp = self.client.get(url).timeout(timeout).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(FetchedPage { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCheck {
    /// Archive day page.
    Archive,
    /// Live ranking table.
    Realtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Retried like a transport failure.
    Invalid(&'static str),
    /// The source says there is nothing for this URL; not retried.
    NotFound,
}

impl ContentCheck {
    pub fn evaluate(self, body: &str) -> Verdict {
        match self {
            ContentCheck::Archive => archive_verdict(body),
            ContentCheck::Realtime => realtime_verdict(body),
        }
    }
}

fn contains_any(body: &str, markers: &[&str]) -> bool { markers.iter().any(|m| body.contains(m)) }

fn anchor_count(body: &str) -> usize {
    let sel = Selector::parse("a").expect("valid selector");
    Html::parse_document(body).select(&sel).count()
}

fn archive_verdict(body: &str) -> Verdict {
    if body.len() <= ARCHIVE_MIN_BYTES {
        return Verdict::Invalid("response too small");
    }
    // The mirror embeds not-found wording in some valid pages, so structure wins.
    if contains_any(body, ARCHIVE_MARKERS) {
        return Verdict::Valid;
    }
    if contains_any(body, NOT_FOUND_MARKERS) && anchor_count(body) < MIN_ANCHORS {
        return Verdict::NotFound;
    }
    Verdict::Valid
}

fn realtime_verdict(body: &str) -> Verdict {
    if contains_any(body, VISITOR_MARKERS) {
        return Verdict::Invalid("visitor verification page");
    }
    if body.len() < REALTIME_MIN_BYTES {
        return Verdict::Invalid("response too small");
    }
    if !contains_any(body, REALTIME_MARKERS) {
        return Verdict::Invalid("ranking table markers missing");
    }
    Verdict::Valid
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// GET with bounded retries and exponential backoff. Every failure mode ends
/// in `None`; nothing is raised to the caller.
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
    stats: Mutex<FetchStats>,
    span: Span,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        let span = info_span!("fetcher", max_retries = config.max_retries);
        Self { transport, config, stats: Mutex::new(FetchStats::default()), span }
    }

    pub fn stats(&self) -> FetchStats { *self.stats.lock() }

    pub fn config(&self) -> &FetchConfig { &self.config }

    pub async fn fetch(&self, url: &str, check: ContentCheck) -> Option<String> {
        let body = self.fetch_with_retries(url, check).instrument(self.span.clone()).await;
        let mut stats = self.stats.lock();
        if body.is_some() { stats.successes += 1 } else { stats.failures += 1 }
        body
    }

    async fn fetch_with_retries(&self, url: &str, check: ContentCheck) -> Option<String> {
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            info!(url, attempt = attempt + 1, attempts, "fetching");
            self.stats.lock().attempts += 1;
            let failure = match self.transport.get(url, self.config.timeout).await {
                Ok(page) if page.status == 200 => match check.evaluate(&page.body) {
                    Verdict::Valid => {
                        info!(url, bytes = page.body.len(), "fetched");
                        return Some(page.body);
                    }
                    Verdict::NotFound => {
                        warn!(url, "source has no data for this page");
                        return None;
                    }
                    Verdict::Invalid(reason) => reason.to_string(),
                },
                Ok(page) => FetchError::Status(page.status).to_string(),
                Err(e) => e.to_string(),
            };
            warn!(url, attempt = attempt + 1, error = %failure, "fetch attempt failed");
            if attempt + 1 < attempts {
                let wait = backoff(self.config.backoff_base, attempt);
                info!(url, wait_secs = wait.as_secs_f64(), "backing off");
                sleep(wait).await;
            }
        }
        error!(url, attempts, "giving up after max retries");
        None
    }
}

/// `base * 2^attempt`, saturating at `Duration::MAX`.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt)).unwrap_or(Duration::MAX)
}
