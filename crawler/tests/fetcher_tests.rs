mod common;

use common::{archive_item, archive_page, Reply, ScriptedTransport};
use hotsearch_crawler::config::FetchConfig;
use hotsearch_crawler::fetcher::{ContentCheck, PageFetcher};
use std::time::Duration;
use tokio::time::Instant;

const URL: &str = "https://archive.test/hots/2025-01-01";

fn fetcher(transport: std::sync::Arc<ScriptedTransport>) -> PageFetcher {
    PageFetcher::new(transport, FetchConfig::default())
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_retries_with_backoff() {
    let transport = ScriptedTransport::new();
    transport.route(URL, vec![Reply::Fail]);
    let f = fetcher(transport.clone());

    let started = Instant::now();
    assert!(f.fetch(URL, ContentCheck::Archive).await.is_none());
    let elapsed = started.elapsed();

    assert_eq!(transport.count(URL), 3);
    // 1s after the first failure, 2s after the second, nothing after the last.
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "elapsed {elapsed:?}");
    let stats = f.stats();
    assert_eq!((stats.attempts, stats.successes, stats.failures), (3, 0, 1));
}

#[tokio::test(start_paused = true)]
async fn recovers_on_a_later_attempt() {
    let transport = ScriptedTransport::new();
    let good = archive_page(&archive_item(1, "恢复成功", "10万"));
    transport.route(URL, vec![Reply::Page(500, "oops".repeat(50)), Reply::Page(200, good.clone())]);

    let body = fetcher(transport.clone()).fetch(URL, ContentCheck::Archive).await;
    assert_eq!(body.as_deref(), Some(good.as_str()));
    assert_eq!(transport.count(URL), 2);
}

#[tokio::test(start_paused = true)]
async fn not_found_page_is_not_retried() {
    let transport = ScriptedTransport::new();
    let missing = format!("<html><body><p>没有找到该日期的数据</p>{}</body></html>", " ".repeat(200));
    transport.route(URL, vec![Reply::Page(200, missing)]);

    let started = Instant::now();
    assert!(fetcher(transport.clone()).fetch(URL, ContentCheck::Archive).await.is_none());
    assert_eq!(transport.count(URL), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn not_found_wording_inside_a_real_page_is_accepted() {
    let transport = ScriptedTransport::new();
    let links = "<a href='/hots/2024-12-31'>前一天</a>".repeat(12);
    let body = format!("<html><body><footer>404 导航</footer>{links}{}</body></html>", " ".repeat(100));
    transport.route(URL, vec![Reply::Page(200, body)]);

    assert!(fetcher(transport.clone()).fetch(URL, ContentCheck::Archive).await.is_some());
    assert_eq!(transport.count(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn tiny_body_counts_as_failure() {
    let transport = ScriptedTransport::new();
    transport.route(URL, vec![Reply::Page(200, "<html></html>".into())]);
    let cfg = FetchConfig { max_retries: 2, ..FetchConfig::default() };

    assert!(PageFetcher::new(transport.clone(), cfg).fetch(URL, ContentCheck::Archive).await.is_none());
    assert_eq!(transport.count(URL), 2);
}

#[tokio::test(start_paused = true)]
async fn large_retry_count_does_not_overflow_backoff() {
    let transport = ScriptedTransport::new();
    transport.route(URL, vec![Reply::Fail]);
    let cfg = FetchConfig { max_retries: 40, backoff_base: Duration::from_millis(1), ..FetchConfig::default() };

    assert!(PageFetcher::new(transport.clone(), cfg).fetch(URL, ContentCheck::Archive).await.is_none());
    assert_eq!(transport.count(URL), 40);
}
