use crate::config::ArchiveConfig;
use crate::fetcher::{ContentCheck, HttpTransport, PageFetcher, Transport};
use anyhow::Result;
use hotsearch_core::extract::parse_page;
use hotsearch_core::persist::PartitionedStore;
use hotsearch_core::{date_range, format_date, parse_date, renumber, HotEntry, RunStats};
use std::sync::Arc;
use std::time::Duration;
use time::Date;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument, Span};

/// Walks archive dates strictly in order: fetch, pause, parse, persist.
pub struct BatchOrchestrator {
    fetcher: PageFetcher,
    store: PartitionedStore,
    base_url: String,
    delay: Duration,
    span: Span,
}

impl BatchOrchestrator {
    pub fn new(config: &ArchiveConfig, transport: Arc<dyn Transport>) -> Self {
        let span = info_span!("batch", output = %config.output_dir.display());
        Self {
            fetcher: PageFetcher::new(transport, config.fetch.clone()),
            store: PartitionedStore::new(&config.output_dir),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delay: config.delay,
            span,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config, Arc::new(HttpTransport::new()?)))
    }

    pub fn store(&self) -> &PartitionedStore { &self.store }

    pub fn fetcher(&self) -> &PageFetcher { &self.fetcher }

    fn url_for(&self, day: &str) -> String { format!("{}/{}", self.base_url, day) }

    /// Fetches and parses one date without persisting. `None` means the page
    /// could not be retrieved; `Some(vec![])` means it held no entries.
    pub async fn fetch_day(&self, date: Date) -> Option<Vec<HotEntry>> {
        let day = format_date(date);
        let html = self.fetcher.fetch(&self.url_for(&day), ContentCheck::Archive).await?;
        sleep(self.delay).await;
        Some(renumber(parse_page(&html, &day)))
    }

    pub async fn scrape_date(&self, date: Date) -> bool {
        self.scrape_one(date).instrument(self.span.clone()).await
    }

    async fn scrape_one(&self, date: Date) -> bool {
        let day = format_date(date);
        info!(date = %day, "scraping");
        let Some(entries) = self.fetch_day(date).await else {
            error!(date = %day, "could not fetch page");
            return false;
        };
        if entries.is_empty() {
            warn!(date = %day, "no entries parsed, recording empty snapshot");
        }
        match self.store.write(&entries, date) {
            Ok(path) => {
                info!(date = %day, count = entries.len(), path = %path.display(), "saved");
                true
            }
            Err(e) => {
                error!(date = %day, error = %e, "failed to save snapshot");
                false
            }
        }
    }

    /// Scrapes every date in `[start, end]`. Individual failures are collected
    /// in the returned stats and never stop the run.
    pub async fn scrape_range(&self, start: Date, end: Date) -> RunStats {
        let span = self.span.clone();
        async move {
            let dates = date_range(start, end);
            let total = dates.len();
            let mut stats = RunStats { total_dates: total, ..RunStats::default() };
            info!(total, "starting range");
            for (i, date) in dates.into_iter().enumerate() {
                info!(progress = i + 1, total, date = %format_date(date), "progress");
                let ok = self.scrape_one(date).await;
                stats.record(&format_date(date), ok);
                if i + 1 < total {
                    sleep(self.delay / 2).await;
                }
            }
            info!(successful = stats.successful, failed = stats.failed, "range complete");
            if !stats.failed_dates.is_empty() {
                warn!(failed_dates = ?stats.failed_dates, "some dates failed");
            }
            stats
        }
        .instrument(span)
        .await
    }

    pub async fn scrape_range_str(&self, start: &str, end: &str) -> Result<RunStats> {
        let (start, end) = (parse_date(start)?, parse_date(end)?);
        Ok(self.scrape_range(start, end).await)
    }
}
