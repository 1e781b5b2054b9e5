//! Ranked-entry extraction from archive day pages and the live ranking table.

pub mod categories;

use crate::model::{HotEntry, Metrics, RealtimeEntry};
use crate::units::normalize;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

/// Below this many table rows the realtime parser also scans topic links.
pub const REALTIME_RECOVERY_THRESHOLD: usize = 20;

const HEAT_MARK: char = '🔥';
const READS_MARK: &str = "阅读";
const DISCUSSIONS_MARK: &str = "讨论";
const ORIGINALS_MARK: &str = "原创";
const PROMOTED_MARK: char = '荐';

fn sel(s: &str) -> Selector { Selector::parse(s).expect("valid selector") }

lazy_static! {
    static ref ANCHOR: Selector = sel("a");
    static ref HEADING: Selector = sel("h2.text-xl");
    static ref METRIC_BOX: Selector = sel("div.flex");
    static ref METRIC: Selector = sel("div.inline-flex");
    static ref BACKUP_CONTAINER: Selector = sel("div.rounded-lg");
    static ref ROW: Selector = sel("tr");
    static ref ROW_TITLE: Selector = sel("td.td-02 a");
    static ref ROW_MARK: Selector = sel("td.td-03");
    static ref TOPIC_LINK: Selector = sel(r#"a[href*="weibo?q="]"#);
    static ref RANK_NO: Regex = Regex::new(r"第\s*(\d+)\s*名").expect("valid regex");
    static ref RANK_PREFIX: Regex = Regex::new(r"第\s*\d+\s*名[：:]?").expect("valid regex");
    static ref FIRST_INT: Regex = Regex::new(r"\d+").expect("valid regex");
    static ref LEADING_INT: Regex = Regex::new(r"^\d+[.:：．]\s*").expect("valid regex");
}

/// Text of an element with each text node trimmed and joined without separator.
fn stripped_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Full-width digits fold to ASCII before parsing; anything else reads as 0.
fn rank_digits(digits: &str) -> u32 {
    digits.nfkc().collect::<String>().parse().unwrap_or(0)
}

/// Splits a heading such as "第1名：标题" into rank and title. Rank is 0 when
/// no number can be found.
pub fn parse_heading(text: &str) -> (u32, String) {
    if let Some(caps) = RANK_NO.captures(text) {
        let rank = rank_digits(&caps[1]);
        let title = RANK_PREFIX.replace_all(text, "").trim().to_string();
        return (rank, title);
    }
    if let Some(m) = FIRST_INT.find(text) {
        let rank = rank_digits(m.as_str());
        let title = LEADING_INT.replace(text, "").trim().to_string();
        return (rank, title);
    }
    (0, text.trim().to_string())
}

/// Parses an archive day page. Falls back to the alternate container layout
/// when the anchor layout yields nothing. Result is sorted by rank; callers
/// renumber before persisting.
pub fn parse_page(html: &str, date: &str) -> Vec<HotEntry> {
    if html.len() < 1000 {
        warn!(date, bytes = html.len(), "page is unusually short");
    }
    let doc = Html::parse_document(html);
    let mut entries = parse_anchors(&doc, date);
    if entries.is_empty() {
        warn!(date, "anchor layout produced no entries, trying container layout");
        entries = doc.select(&BACKUP_CONTAINER).filter_map(|c| entry_from(c, date)).collect();
        info!(date, count = entries.len(), "container layout parsed");
    }
    entries.sort_by_key(|e| e.rank());
    entries
}

fn parse_anchors(doc: &Html, date: &str) -> Vec<HotEntry> {
    let mut anchors = 0usize;
    let mut candidates = 0usize;
    let mut entries = Vec::new();
    for a in doc.select(&ANCHOR) {
        anchors += 1;
        if a.select(&HEADING).next().is_none() || a.select(&METRIC_BOX).next().is_none() {
            continue;
        }
        candidates += 1;
        entries.extend(entry_from(a, date));
    }
    info!(date, anchors, candidates, parsed = entries.len(), "anchor layout parsed");
    entries
}

fn entry_from(container: ElementRef<'_>, date: &str) -> Option<HotEntry> {
    let heading = container.select(&HEADING).next()?;
    let metric_box = container.select(&METRIC_BOX).next()?;
    let (rank, title) = parse_heading(&stripped_text(heading));

    let mut category = String::new();
    let mut metrics = Metrics::default();
    for fragment in metric_box.select(&METRIC) {
        classify_fragment(&stripped_text(fragment), &mut category, &mut metrics);
    }

    let entry = HotEntry::new(rank, title.as_str(), category, metrics, date);
    if entry.is_none() {
        debug!(date, rank, title = %title, "skipping invalid entry");
    }
    entry
}

fn classify_fragment(text: &str, category: &mut String, metrics: &mut Metrics) {
    if text.contains(HEAT_MARK) {
        metrics.heat = normalize(&text.replace(HEAT_MARK, ""));
    } else if text.contains(READS_MARK) {
        metrics.reads = normalize(&text.replace(READS_MARK, ""));
    } else if text.contains(DISCUSSIONS_MARK) {
        metrics.discussions = normalize(&text.replace(DISCUSSIONS_MARK, ""));
    } else if text.contains(ORIGINALS_MARK) {
        metrics.originals = normalize(&text.replace(ORIGINALS_MARK, ""));
    } else if let Some(label) = categories::classify(text) {
        *category = label.to_string();
    } else {
        debug!(fragment = text, "ignoring unrecognised metric fragment");
    }
}

/// True when more than a third of the non-space characters are digits.
pub fn is_digit_noise(text: &str) -> bool {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    let digits = text.chars().filter(char::is_ascii_digit).count();
    total > 0 && digits * 3 > total
}

fn keep_title(title: &str) -> bool { !title.is_empty() && !is_digit_noise(title) }

fn row_title(row: ElementRef<'_>) -> Option<String> {
    let anchor = row.select(&ROW_TITLE).next()?;
    if row.select(&ROW_MARK).any(|m| stripped_text(m).contains(PROMOTED_MARK)) {
        debug!("skipping promoted row");
        return None;
    }
    let title = stripped_text(anchor);
    if !keep_title(&title) {
        debug!(title = %title, "skipping noise row");
        return None;
    }
    Some(title)
}

/// Parses the live ranking table into deduplicated entries ranked from 1.
pub fn parse_realtime(html: &str) -> Vec<RealtimeEntry> {
    let doc = Html::parse_document(html);
    let mut titles: Vec<String> = doc.select(&ROW).filter_map(row_title).collect();
    let table_rows = titles.len();
    if table_rows < REALTIME_RECOVERY_THRESHOLD {
        titles.extend(doc.select(&TOPIC_LINK).map(stripped_text).filter(|t| keep_title(t)));
        debug!(table_rows, recovered = titles.len() - table_rows, "scanned topic links");
    }
    let entries = dedup_and_rank(titles);
    info!(table_rows, count = entries.len(), "realtime table parsed");
    entries
}

/// Keeps the first occurrence of each exact title and numbers the survivors
/// 1..=N in their original order.
pub fn dedup_and_rank<I>(titles: I) -> Vec<RealtimeEntry>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .enumerate()
        .map(|(i, title)| RealtimeEntry { rank: i as u32 + 1, title })
        .collect()
}
