#![allow(dead_code)]

use async_trait::async_trait;
use hotsearch_core::RealtimeEntry;
use hotsearch_crawler::fetcher::{FetchError, FetchedPage, Transport};
use hotsearch_crawler::realtime::AcquisitionStrategy;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum Reply {
    Page(u16, String),
    Fail,
}

/// Serves canned replies per URL. Each URL's queue is consumed in order and
/// its last reply repeats; unknown URLs fail.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn route(&self, url: &str, replies: Vec<Reply>) {
        self.routes.lock().insert(url.to_string(), replies.into());
    }

    pub fn calls(&self) -> Vec<String> { self.calls.lock().clone() }

    pub fn count(&self, url: &str) -> usize { self.calls.lock().iter().filter(|u| *u == url).count() }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.calls.lock().push(url.to_string());
        let reply = {
            let mut routes = self.routes.lock();
            match routes.get_mut(url) {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
        };
        match reply {
            Some(Reply::Page(status, body)) => Ok(FetchedPage { status, body }),
            Some(Reply::Fail) | None => Err(FetchError::Transport(format!("connection refused: {url}"))),
        }
    }
}

pub struct FixedStrategy {
    label: &'static str,
    entries: Vec<RealtimeEntry>,
    calls: Arc<AtomicUsize>,
}

impl FixedStrategy {
    pub fn new(label: &'static str, titles: &[&str]) -> Self {
        let entries = titles
            .iter()
            .enumerate()
            .map(|(i, t)| RealtimeEntry { rank: i as u32 + 1, title: t.to_string() })
            .collect();
        Self { label, entries, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn failing(label: &'static str) -> Self { Self::new(label, &[]) }

    pub fn with_entries(label: &'static str, entries: Vec<RealtimeEntry>) -> Self {
        Self { label, entries, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Shared call counter that outlives the boxed strategy.
    pub fn counter(&self) -> Arc<AtomicUsize> { self.calls.clone() }
}

#[async_trait]
impl AcquisitionStrategy for FixedStrategy {
    fn name(&self) -> &str { self.label }

    async fn acquire(&self) -> Vec<RealtimeEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries.clone()
    }
}

pub fn calls(counter: &AtomicUsize) -> usize { counter.load(Ordering::SeqCst) }

pub fn entries(n: usize) -> Vec<RealtimeEntry> {
    (1..=n).map(|i| RealtimeEntry { rank: i as u32, title: format!("缓存话题第{i}条") }).collect()
}

pub fn archive_item(rank: u32, title: &str, heat: &str) -> String {
    format!(
        r#"<a href="https://s.weibo.com/weibo?q=x" aria-label="查看微博话题"><article><h2 class="text-xl">第{rank}名：{title}</h2><div class="flex flex-wrap"><div class="inline-flex">社会</div><div class="inline-flex">🔥{heat}</div></div></article></a>"#
    )
}

pub fn archive_page(items: &str) -> String {
    format!(r#"<!DOCTYPE html><html><head><title>微博热搜历史</title></head><body><main>{items}</main></body></html>"#)
}

/// A live ranking page large enough to pass the realtime content check.
pub fn realtime_page(titles: &[&str]) -> String {
    let rows: String = titles
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                r#"<tr><td class="td-01 ranktop">{}</td><td class="td-02"><a href="/weibo?q=%23x%23">{t}</a><span>12345</span></td><td class="td-03"></td></tr>"#,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="pl_top_realtimehot"><table><tbody>{rows}</tbody></table></div><!--{}--></body></html>"#,
        "padding ".repeat(200)
    )
}
