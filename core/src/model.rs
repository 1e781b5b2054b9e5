use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::units::round2;

/// Engagement figures in the canonical ten-thousand unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub heat: f64,
    pub reads: f64,
    pub discussions: f64,
    pub originals: f64,
}

impl Metrics {
    fn canonical(self) -> Self {
        Self {
            heat: canonical(self.heat),
            reads: canonical(self.reads),
            discussions: canonical(self.discussions),
            originals: canonical(self.originals),
        }
    }
}

fn canonical(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { round2(v) } else { 0.0 }
}

/// One ranked topic of a daily snapshot. Decoding goes through
/// [`HotEntry::new`], so stored entries get the same checks as parsed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredEntry")]
pub struct HotEntry {
    rank: u32,
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    heat: f64,
    #[serde(default)]
    reads: f64,
    #[serde(default)]
    discussions: f64,
    #[serde(default)]
    originals: f64,
    date: String,
}

#[derive(Deserialize)]
struct StoredEntry {
    rank: u32,
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    heat: f64,
    #[serde(default)]
    reads: f64,
    #[serde(default)]
    discussions: f64,
    #[serde(default)]
    originals: f64,
    date: String,
}

impl TryFrom<StoredEntry> for HotEntry {
    type Error = String;

    fn try_from(s: StoredEntry) -> Result<Self, Self::Error> {
        let metrics = Metrics { heat: s.heat, reads: s.reads, discussions: s.discussions, originals: s.originals };
        HotEntry::new(s.rank, s.title, s.category, metrics, &s.date)
            .ok_or_else(|| format!("invalid entry: rank {} with blank title or zero rank", s.rank))
    }
}

impl HotEntry {
    /// Builds an entry, or `None` when the rank is 0 or the title is blank.
    /// Metrics are clamped to non-negative values rounded to 2 decimals.
    pub fn new(rank: u32, title: impl Into<String>, category: impl Into<String>, metrics: Metrics, date: &str) -> Option<Self> {
        let title = title.into().trim().to_string();
        if rank == 0 || title.is_empty() {
            return None;
        }
        let m = metrics.canonical();
        Some(Self {
            rank,
            title,
            category: category.into(),
            heat: m.heat,
            reads: m.reads,
            discussions: m.discussions,
            originals: m.originals,
            date: date.to_string(),
        })
    }

    pub fn rank(&self) -> u32 { self.rank }
    pub fn title(&self) -> &str { &self.title }
    pub fn category(&self) -> &str { &self.category }
    pub fn date(&self) -> &str { &self.date }
    pub fn heat(&self) -> f64 { self.heat }

    pub fn metrics(&self) -> Metrics {
        Metrics { heat: self.heat, reads: self.reads, discussions: self.discussions, originals: self.originals }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    fn is_valid(&self) -> bool { self.rank > 0 && !self.title.trim().is_empty() }
}

/// Drops invalid entries, orders by rank and renumbers from 1 without gaps.
pub fn renumber(entries: Vec<HotEntry>) -> Vec<HotEntry> {
    let mut valid: Vec<HotEntry> = entries.into_iter().filter(HotEntry::is_valid).collect();
    valid.sort_by_key(|e| e.rank);
    valid.into_iter().enumerate().map(|(i, e)| e.with_rank(i as u32 + 1)).collect()
}

/// Persisted unit: all entries of one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: String,
    pub count: usize,
    pub data: Vec<HotEntry>,
}

impl Snapshot {
    pub fn new(date: impl Into<String>, data: Vec<HotEntry>) -> Self {
        Self { date: date.into(), count: data.len(), data }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_dates: usize,
    pub successful: usize,
    pub failed: usize,
    pub failed_dates: Vec<String>,
}

impl RunStats {
    pub fn record(&mut self, date: &str, ok: bool) {
        if ok {
            self.successful += 1;
        } else {
            self.failed += 1;
            self.failed_dates.push(date.to_string());
        }
    }
}

/// A live ranking row; the live source exposes no engagement metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeEntry {
    pub rank: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeCacheRecord {
    pub timestamp: String,
    pub count: usize,
    pub data: Vec<RealtimeEntry>,
}

impl RealtimeCacheRecord {
    pub fn new(data: Vec<RealtimeEntry>, at: OffsetDateTime) -> Self {
        Self { timestamp: at.format(&Rfc3339).unwrap_or_default(), count: data.len(), data }
    }

    /// Parses RFC 3339, falling back to a naive ISO 8601 datetime read as UTC.
    pub fn written_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.timestamp, &Rfc3339)
            .ok()
            .or_else(|| PrimitiveDateTime::parse(&self.timestamp, &Iso8601::DEFAULT).ok().map(|t| t.assume_utc()))
    }

    /// A record whose timestamp cannot be read is never fresh.
    pub fn is_fresh(&self, now: OffsetDateTime, bound: std::time::Duration) -> bool {
        match self.written_at() {
            Some(at) => (now - at) < time::Duration::seconds(bound.as_secs() as i64),
            None => false,
        }
    }
}

pub fn parse_date(s: &str) -> Result<Date> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

pub fn format_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

pub fn year_month(d: Date) -> String {
    format!("{:04}-{:02}", d.year(), u8::from(d.month()))
}

/// Every date in `[start, end]`; empty when `end < start`.
pub fn date_range(start: Date, end: Date) -> Vec<Date> {
    let mut out = Vec::new();
    let mut cur = Some(start);
    while let Some(d) = cur {
        if d > end {
            break;
        }
        out.push(d);
        cur = d.next_day();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn entry(rank: u32, title: &str) -> HotEntry {
        HotEntry::new(rank, title, "", Metrics::default(), "2025-01-01").unwrap()
    }

    #[test]
    fn rejects_rank_zero_and_blank_title() {
        assert!(HotEntry::new(0, "t", "", Metrics::default(), "2025-01-01").is_none());
        assert!(HotEntry::new(3, "   ", "", Metrics::default(), "2025-01-01").is_none());
    }

    #[test]
    fn clamps_metrics_to_canonical() {
        let m = Metrics { heat: -4.0, reads: 1.234, discussions: f64::NAN, originals: 2.0 };
        let e = HotEntry::new(1, "t", "", m, "2025-01-01").unwrap();
        assert_eq!(e.metrics(), Metrics { heat: 0.0, reads: 1.23, discussions: 0.0, originals: 2.0 });
    }

    #[test]
    fn decoding_applies_entry_checks() {
        let e: HotEntry = serde_json::from_str(r#"{"rank":2,"title":" 话题 ","heat":-3.0,"reads":1.239,"date":"2025-01-01"}"#).unwrap();
        assert_eq!(e.title(), "话题");
        assert_eq!(e.metrics(), Metrics { heat: 0.0, reads: 1.24, discussions: 0.0, originals: 0.0 });
        assert!(serde_json::from_str::<HotEntry>(r#"{"rank":0,"title":"t","date":"2025-01-01"}"#).is_err());
        assert!(serde_json::from_str::<HotEntry>(r#"{"rank":1,"title":"  ","date":"2025-01-01"}"#).is_err());
    }

    #[test]
    fn renumber_makes_ranks_contiguous() {
        let out = renumber(vec![entry(7, "c"), entry(2, "a"), entry(5, "b"), entry(2, "a2")]);
        let ranks: Vec<u32> = out.iter().map(|e| e.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        let titles: Vec<&str> = out.iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let days = date_range(date!(2024 - 12 - 30), date!(2025 - 01 - 02));
        let s: Vec<String> = days.into_iter().map(format_date).collect();
        assert_eq!(s, vec!["2024-12-30", "2024-12-31", "2025-01-01", "2025-01-02"]);
        assert!(date_range(date!(2025 - 01 - 02), date!(2025 - 01 - 01)).is_empty());
    }

    #[test]
    fn cache_freshness_reads_naive_timestamps() {
        let rec = RealtimeCacheRecord { timestamp: "2025-03-01T10:00:00.123456".into(), count: 0, data: vec![] };
        let hour = std::time::Duration::from_secs(3600);
        assert!(rec.is_fresh(datetime!(2025-03-01 10:59 UTC), hour));
        assert!(!rec.is_fresh(datetime!(2025-03-01 11:01 UTC), hour));
        let junk = RealtimeCacheRecord { timestamp: "yesterday".into(), count: 0, data: vec![] };
        assert!(!junk.is_fresh(datetime!(2025-03-01 10:00 UTC), hour));
    }
}
