use anyhow::Result;
use clap::{Parser, Subcommand};
use hotsearch_core::persist::{read_all, PartitionedStore};
use hotsearch_core::{renumber, Snapshot};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hotsearch-preprocess")]
#[command(about = "Clean scraped hot-search snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop entries without heat and renumber what is left
    Clean {
        /// Root of the scraped month/day tree
        #[arg(long, default_value = "data")]
        input: String,
        /// Where the cleaned tree is written (same layout)
        #[arg(long, default_value = "data_processed")]
        output: String,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CleanReport {
    snapshots: usize,
    kept: usize,
    dropped: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Clean { input, output } => {
            let report = clean_store(Path::new(&input), Path::new(&output))?;
            println!("Cleaned {} days: kept {} entries, dropped {}", report.snapshots, report.kept, report.dropped);
            Ok(())
        }
    }
}

fn clean_snapshot(snapshot: Snapshot) -> (Snapshot, usize) {
    let before = snapshot.data.len();
    let kept: Vec<_> = snapshot.data.into_iter().filter(|e| e.heat() > 0.0).collect();
    let dropped = before - kept.len();
    (Snapshot::new(snapshot.date, renumber(kept)), dropped)
}

fn clean_store(input: &Path, output: &Path) -> Result<CleanReport> {
    let out = PartitionedStore::new(output);
    let mut report = CleanReport::default();
    for snapshot in read_all(input)? {
        let (cleaned, dropped) = clean_snapshot(snapshot);
        if dropped > 0 {
            tracing::debug!(date = %cleaned.date, dropped, "removed entries without heat");
        }
        out.write_snapshot(&cleaned)?;
        report.snapshots += 1;
        report.kept += cleaned.count;
        report.dropped += dropped;
    }
    tracing::info!(input = %input.display(), output = %output.display(), snapshots = report.snapshots, "clean complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotsearch_core::{parse_date, HotEntry, Metrics};

    fn entry(rank: u32, title: &str, heat: f64) -> HotEntry {
        let m = Metrics { heat, ..Metrics::default() };
        HotEntry::new(rank, title, "社会", m, "2025-01-05").unwrap()
    }

    #[test]
    fn clean_drops_cold_entries_and_renumbers() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let store = PartitionedStore::new(input.path());
        let day = parse_date("2025-01-05").unwrap();
        store.write(&[entry(1, "热", 120.5), entry(2, "冷", 0.0), entry(3, "温", 3.0)], day).unwrap();
        store.write(&[], parse_date("2025-02-01").unwrap()).unwrap();

        let report = clean_store(input.path(), output.path()).unwrap();
        assert_eq!(report, CleanReport { snapshots: 2, kept: 2, dropped: 1 });

        let cleaned = PartitionedStore::new(output.path()).read(day).unwrap();
        assert_eq!(cleaned.count, 2);
        let got: Vec<(u32, &str)> = cleaned.data.iter().map(|e| (e.rank(), e.title())).collect();
        assert_eq!(got, vec![(1, "热"), (2, "温")]);
        assert!(output.path().join("2025-02/2025-02-01.json").exists());
    }
}
