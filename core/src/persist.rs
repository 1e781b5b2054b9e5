use crate::model::{format_date, parse_date, year_month, HotEntry, RealtimeCacheRecord, RealtimeEntry, Snapshot};
use anyhow::{Context, Result};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use time::{Date, OffsetDateTime};
use tracing::warn;
use walkdir::WalkDir;

/// Day snapshots laid out as `<root>/<YYYY-MM>/<YYYY-MM-DD>.json`.
#[derive(Debug, Clone)]
pub struct PartitionedStore {
    root: PathBuf,
}

impl PartitionedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn path_for(&self, date: Date) -> PathBuf {
        self.root.join(year_month(date)).join(format!("{}.json", format_date(date)))
    }

    /// Overwrites the snapshot for `date`. An empty slice is still written so the
    /// date reads as checked.
    pub fn write(&self, entries: &[HotEntry], date: Date) -> Result<PathBuf> {
        self.write_snapshot(&Snapshot::new(format_date(date), entries.to_vec()))
    }

    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let date = parse_date(&snapshot.date)?;
        let path = self.path_for(date);
        write_json(&path, snapshot)?;
        Ok(path)
    }

    pub fn read(&self, date: Date) -> Result<Snapshot> {
        read_snapshot(self.path_for(date))
    }

    pub fn read_all(&self) -> Result<Vec<Snapshot>> { read_all(&self.root) }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let snapshot = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("decoding {}", path.display()))?;
    Ok(snapshot)
}

/// Every snapshot file under `root` (any depth), ordered by date. Files whose
/// stem is not a date are ignored; undecodable snapshots are skipped with a warning.
pub fn read_all<P: AsRef<Path>>(root: P) -> Result<Vec<Snapshot>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() || p.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let is_dated = p.file_stem().and_then(|s| s.to_str()).map_or(false, |s| parse_date(s).is_ok());
        if !is_dated {
            continue;
        }
        match read_snapshot(p) {
            Ok(s) => out.push(s),
            Err(e) => warn!(path = %p.display(), error = %e, "skipping unreadable snapshot"),
        }
    }
    out.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(out)
}

/// Missing or undecodable cache files read as `None`.
pub fn read_cache<P: AsRef<Path>>(path: P) -> Option<RealtimeCacheRecord> {
    let path = path.as_ref();
    let f = File::open(path).ok()?;
    match serde_json::from_reader(BufReader::new(f)) {
        Ok(rec) => Some(rec),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt realtime cache");
            None
        }
    }
}

pub fn write_cache<P: AsRef<Path>>(path: P, entries: &[RealtimeEntry], at: OffsetDateTime) -> Result<()> {
    write_json(path.as_ref(), &RealtimeCacheRecord::new(entries.to_vec(), at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn path_is_month_partitioned() {
        let store = PartitionedStore::new("/data");
        assert_eq!(store.path_for(date!(2025 - 02 - 07)), PathBuf::from("/data/2025-02/2025-02-07.json"));
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_cache(dir.path().join("nope.json")).is_none());
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert!(read_cache(dir.path().join("bad.json")).is_none());
    }
}
