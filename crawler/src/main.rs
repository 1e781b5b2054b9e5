use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use hotsearch_core::{parse_date, HotEntry, RunStats};
use hotsearch_crawler::batch::BatchOrchestrator;
use hotsearch_crawler::browser::{render_to_file, Capabilities};
use hotsearch_crawler::config::{ArchiveConfig, FetchConfig, RealtimeConfig, ARCHIVE_BASE_URL, DEFAULT_CACHE_FILE};
use hotsearch_crawler::realtime::RealtimeAcquirer;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hotsearch")]
#[command(about = "Collect Weibo hot-search rankings from the archive mirror and the live board")]
struct Cli {
    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ArchiveArgs {
    /// Seconds to pause after each fetch; half of it is also waited between dates
    #[arg(long, default_value_t = 2.0)]
    delay: f64,
    #[arg(long, default_value_t = 3)]
    max_retries: u32,
    #[arg(long, default_value = "data")]
    output_dir: PathBuf,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    #[arg(long, default_value = ARCHIVE_BASE_URL)]
    base_url: String,
}

impl ArchiveArgs {
    fn config(&self) -> Result<ArchiveConfig> {
        let Ok(delay) = Duration::try_from_secs_f64(self.delay) else {
            bail!("--delay must be a non-negative number of seconds, got {}", self.delay);
        };
        Ok(ArchiveConfig {
            base_url: self.base_url.clone(),
            output_dir: self.output_dir.clone(),
            delay,
            fetch: FetchConfig {
                timeout: Duration::from_secs(self.timeout_secs),
                max_retries: self.max_retries,
                ..FetchConfig::default()
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every archive day in [start, end]
    Scrape {
        #[arg(long, default_value = "2025-01-01")]
        start: String,
        #[arg(long, default_value = "2025-12-12")]
        end: String,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// Scrape a single archive day
    ScrapeDate {
        #[arg(long)]
        date: String,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// Fetch and parse one day without saving, printing a short report
    Probe {
        #[arg(long, default_value = "2025-01-01")]
        date: String,
        #[command(flatten)]
        archive: ArchiveArgs,
    },
    /// Current live top 50
    Realtime {
        /// Ignore a fresh cache and go to the network
        #[arg(long, default_value_t = false)]
        no_cache: bool,
        #[arg(long, default_value = DEFAULT_CACHE_FILE)]
        cache_file: PathBuf,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
        /// Save a fresh fetch to this file instead of printing
        #[arg(long)]
        output: Option<PathBuf>,
        /// Drive the browser from this process instead of a worker
        #[arg(long, default_value_t = false)]
        in_process_browser: bool,
    },
    /// Browser worker used by the realtime command
    #[command(hide = true)]
    Render {
        #[arg(long)]
        url: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 90)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scrape { start, end, archive } => {
            let orchestrator = BatchOrchestrator::from_config(&archive.config()?)?;
            let stats = orchestrator.scrape_range_str(&start, &end).await?;
            print_summary(&stats);
            Ok(())
        }
        Commands::ScrapeDate { date, archive } => {
            let orchestrator = BatchOrchestrator::from_config(&archive.config()?)?;
            if !orchestrator.scrape_date(parse_date(&date)?).await {
                bail!("failed to scrape {date}");
            }
            println!("Saved {date} under {}", orchestrator.store().root().display());
            Ok(())
        }
        Commands::Probe { date, archive } => {
            let orchestrator = BatchOrchestrator::from_config(&archive.config()?)?;
            let Some(entries) = orchestrator.fetch_day(parse_date(&date)?).await else {
                bail!("could not fetch {date}");
            };
            print_probe(&date, &entries);
            Ok(())
        }
        Commands::Realtime { no_cache, cache_file, timeout_secs, max_retries, output, in_process_browser } => {
            let config = RealtimeConfig {
                cache_file,
                fetch: FetchConfig { timeout: Duration::from_secs(timeout_secs), max_retries, ..FetchConfig::default() },
                prefer_in_process_browser: in_process_browser,
                ..RealtimeConfig::default()
            };
            let acquirer = RealtimeAcquirer::from_config(&config, &Capabilities::probe())?;
            if let Some(path) = output {
                if !acquirer.fetch_and_save(&path).await {
                    bail!("fresh fetch failed");
                }
                println!("Saved to {}", path.display());
                return Ok(());
            }
            let got = acquirer.acquire(!no_cache).await;
            if got.entries.is_empty() {
                bail!("no realtime data available");
            }
            println!("Source: {:?}", got.source);
            for e in &got.entries {
                println!("{:>2}. {}", e.rank, e.title);
            }
            Ok(())
        }
        Commands::Render { url, output, timeout_secs } => {
            let n = render_to_file(&url, &output, Duration::from_secs(timeout_secs)).await?;
            tracing::info!(count = n, "render complete");
            Ok(())
        }
    }
}

fn print_summary(stats: &RunStats) {
    println!("Total dates: {}", stats.total_dates);
    println!("Successful:  {}", stats.successful);
    println!("Failed:      {}", stats.failed);
    if !stats.failed_dates.is_empty() {
        println!("Failed dates:");
        for d in stats.failed_dates.iter().take(5) {
            println!("  {d}");
        }
        if stats.failed_dates.len() > 5 {
            println!("  ... and {} more", stats.failed_dates.len() - 5);
        }
    }
}

fn print_probe(date: &str, entries: &[HotEntry]) {
    println!("{date}: {} entries", entries.len());
    if entries.is_empty() {
        return;
    }
    for e in entries.iter().take(5) {
        println!("{:>2}. [{}] {} (heat {:.2}万)", e.rank(), e.category(), e.title(), e.heat());
    }
    let first = entries.first().map_or(0, |e| e.rank());
    let last = entries.last().map_or(0, |e| e.rank());
    let mean_heat = entries.iter().map(HotEntry::heat).sum::<f64>() / entries.len() as f64;
    let reads: f64 = entries.iter().map(|e| e.metrics().reads).sum();
    let discussions: f64 = entries.iter().map(|e| e.metrics().discussions).sum();
    println!("Ranks {first}..{last}, mean heat {mean_heat:.2}万");
    println!("Total reads {reads:.2}万, total discussions {discussions:.2}万");
}
