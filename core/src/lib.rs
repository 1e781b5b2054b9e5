pub mod extract;
pub mod model;
pub mod persist;
pub mod units;

pub use model::{
    date_range, format_date, parse_date, renumber, year_month, HotEntry, Metrics, RealtimeCacheRecord, RealtimeEntry, RunStats, Snapshot,
};
