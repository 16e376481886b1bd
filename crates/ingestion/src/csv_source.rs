//! Streaming CSV tick source.
//!
//! Rows are parsed one at a time into compact [`RawTick`]s; the raw
//! string table is never held in memory. The header is checked before
//! any row is read so schema failures surface before other work.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use tickframe_core::{Error, RawTick, Result, TimestampNs};

/// Required input columns.
const REQUIRED_COLUMNS: [&str; 3] = ["timestamp", "bid", "ask"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    bid: f64,
    ask: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Read all ticks from a delimited file.
///
/// Fails with `MISSING_COLUMN` when any of `timestamp`/`bid`/`ask` is
/// absent, `TIMEZONE_ERROR` when a timestamp cannot be resolved to UTC
/// nanoseconds, and `IO_ERROR` for unreadable files or malformed
/// numeric cells.
pub fn read_csv_ticks(path: &Path) -> Result<Vec<RawTick>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !headers.iter().any(|h| h == **name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::missing_columns(missing));
    }

    let mut ticks = Vec::new();
    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let number = index as u64 + 1;
        let timestamp_ns = parse_timestamp_ns(number, &row.timestamp)?;
        ticks.push(RawTick {
            row: number,
            timestamp_ns,
            bid: row.bid,
            ask: row.ask,
            volume: row.volume,
        });
    }

    debug!(path = %path.display(), rows = ticks.len(), "loaded csv ticks");
    Ok(ticks)
}

/// Resolve one ISO-8601 timestamp cell to UTC nanoseconds.
///
/// Accepts RFC-3339 (`Z` or numeric offset) and the naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.frac]` form, which is taken as UTC.
fn parse_timestamp_ns(row: u64, value: &str) -> Result<TimestampNs> {
    let trimmed = value.trim();
    let utc: DateTime<Utc> = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => {
            let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                .map_err(|e| Error::timezone(row, trimmed, e.to_string()))?;
            Utc.from_utc_datetime(&naive)
        }
    };
    utc.timestamp_nanos_opt()
        .ok_or_else(|| Error::timezone(row, trimmed, "outside the representable nanosecond range"))
}
