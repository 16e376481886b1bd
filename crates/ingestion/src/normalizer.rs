//! Tick normalization: validate, stable sort, dedupe, assign dense ids.
//!
//! Ordering is deterministic regardless of input order: the sort is
//! stable on `timestamp_ns`, so equal timestamps keep their input
//! order, and sequence ids are assigned only afterwards.

use std::collections::HashSet;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tickframe_core::{
    Error, NegativeSpreadPolicy, RawTick, Result, RunConfig, Tick, TimestampNs,
};

/// Counters describing one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeStats {
    /// Rows seen in the input.
    pub n_raw_rows: u64,
    /// Rows surviving validation, sort and dedup.
    pub n_normalized_rows: u64,
    /// Exact `(timestamp, bid, ask)` duplicates removed.
    pub dropped_duplicates: u64,
    /// Crossed quotes removed under the drop policy.
    pub dropped_negative_spread: u64,
    /// Whether the input required reordering.
    pub resorted: bool,
}

/// Ordered, immutable tick series with non-decreasing timestamps.
#[derive(Debug, Clone)]
pub struct NormalizedTickSeries {
    ticks: Vec<Tick>,
    stats: NormalizeStats,
}

impl NormalizedTickSeries {
    /// The normalized ticks, ascending by timestamp.
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Normalization counters.
    pub fn stats(&self) -> &NormalizeStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Wall-time span from first to last tick, 0 for short series.
    pub fn total_duration_ns(&self) -> i64 {
        match (self.ticks.first(), self.ticks.last()) {
            (Some(first), Some(last)) => last.timestamp_ns - first.timestamp_ns,
            _ => 0,
        }
    }
}

/// Normalize raw rows into an ordered series.
///
/// Applies the crossed-quote policy, the stable sort (or the strict
/// ordering check), optional exact-duplicate removal, and finally dense
/// sequence ids from 0.
pub fn normalize(raw: Vec<RawTick>, config: &RunConfig) -> Result<NormalizedTickSeries> {
    let n_raw_rows = raw.len() as u64;

    let mut dropped_negative_spread = 0u64;
    let mut rows = Vec::with_capacity(raw.len());
    for row in raw {
        if row.ask < row.bid {
            match config.negative_spread_policy {
                NegativeSpreadPolicy::Abort => {
                    return Err(Error::NegativeSpread {
                        row: row.row,
                        bid: row.bid,
                        ask: row.ask,
                    })
                }
                NegativeSpreadPolicy::Drop => {
                    warn!(row = row.row, bid = row.bid, ask = row.ask, "dropping crossed quote");
                    dropped_negative_spread += 1;
                    continue;
                }
            }
        }
        rows.push(row);
    }

    let first_out_of_order = rows
        .windows(2)
        .position(|pair| pair[1].timestamp_ns < pair[0].timestamp_ns);
    let resorted = match first_out_of_order {
        Some(index) if config.strict_sorted_input => {
            return Err(Error::UnsortedInput {
                row: rows[index + 1].row,
            })
        }
        Some(_) => {
            // sort_by_key is stable: ties keep input order.
            rows.sort_by_key(|row| row.timestamp_ns);
            true
        }
        None => false,
    };

    let mut dropped_duplicates = 0u64;
    let kept = if config.dedup {
        let mut kept = Vec::with_capacity(rows.len());
        let mut run_ts: Option<TimestampNs> = None;
        let mut seen: HashSet<(OrderedFloat<f64>, OrderedFloat<f64>)> = HashSet::new();
        for row in rows {
            if run_ts != Some(row.timestamp_ns) {
                run_ts = Some(row.timestamp_ns);
                seen.clear();
            }
            if seen.insert((OrderedFloat(row.bid), OrderedFloat(row.ask))) {
                kept.push(row);
            } else {
                dropped_duplicates += 1;
            }
        }
        kept
    } else {
        rows
    };

    let ticks: Vec<Tick> = kept
        .into_iter()
        .enumerate()
        .map(|(index, row)| Tick {
            sequence_id: index as u64,
            timestamp_ns: row.timestamp_ns,
            bid: row.bid,
            ask: row.ask,
            volume: row.volume,
        })
        .collect();

    let stats = NormalizeStats {
        n_raw_rows,
        n_normalized_rows: ticks.len() as u64,
        dropped_duplicates,
        dropped_negative_spread,
        resorted,
    };
    debug!(?stats, "normalized tick series");

    Ok(NormalizedTickSeries { ticks, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickframe_core::config::CsvConfig;

    fn base_config() -> RunConfig {
        RunConfig::from_json(r#"{"out_dir": "/tmp/runs", "demo": true, "bar_frames": []}"#)
            .unwrap()
    }

    fn raw(row: u64, ts_ns: i64, bid: f64, ask: f64) -> RawTick {
        RawTick {
            row,
            timestamp_ns: ts_ns,
            bid,
            ask,
            volume: None,
        }
    }

    #[test]
    fn test_sort_and_dense_ids() {
        let config = base_config();
        let series = normalize(
            vec![raw(1, 300, 1.0, 1.1), raw(2, 100, 1.0, 1.1), raw(3, 200, 1.0, 1.1)],
            &config,
        )
        .unwrap();
        let ts: Vec<i64> = series.ticks().iter().map(|t| t.timestamp_ns).collect();
        assert_eq!(ts, vec![100, 200, 300]);
        let ids: Vec<u64> = series.ticks().iter().map(|t| t.sequence_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(series.stats().resorted);
    }

    #[test]
    fn test_stable_sort_keeps_tie_order() {
        let config = base_config();
        let series = normalize(
            vec![
                raw(1, 200, 1.0, 1.1),
                raw(2, 100, 2.0, 2.1),
                raw(3, 100, 3.0, 3.1),
            ],
            &config,
        )
        .unwrap();
        // rows 2 and 3 share a timestamp; input order must survive
        assert_eq!(series.ticks()[0].bid, 2.0);
        assert_eq!(series.ticks()[1].bid, 3.0);
        assert_eq!(series.ticks()[2].bid, 1.0);
    }

    #[test]
    fn test_strict_sorted_input() {
        let mut config = base_config();
        config.strict_sorted_input = true;
        let err = normalize(vec![raw(1, 200, 1.0, 1.1), raw(2, 100, 1.0, 1.1)], &config)
            .unwrap_err();
        assert_eq!(err.code(), "UNSORTED_INPUT");
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_negative_spread_abort_default() {
        let config = base_config();
        let err = normalize(vec![raw(1, 100, 1.10002, 1.10000)], &config).unwrap_err();
        assert_eq!(err.code(), "NEGATIVE_SPREAD");
    }

    #[test]
    fn test_negative_spread_drop_policy() {
        let mut config = base_config();
        config.negative_spread_policy = NegativeSpreadPolicy::Drop;
        let series = normalize(
            vec![raw(1, 100, 1.10002, 1.10000), raw(2, 200, 1.0, 1.1)],
            &config,
        )
        .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.stats().dropped_negative_spread, 1);
        assert_eq!(series.stats().n_raw_rows, 2);
    }

    #[test]
    fn test_dedup_exact_duplicates() {
        let config = base_config();
        let series = normalize(
            vec![
                raw(1, 100, 1.0, 1.1),
                raw(2, 100, 1.0, 1.1),
                raw(3, 100, 1.0, 1.2),
            ],
            &config,
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.stats().dropped_duplicates, 1);
    }

    #[test]
    fn test_dedup_disabled() {
        let mut config = base_config();
        config.dedup = false;
        let series = normalize(
            vec![raw(1, 100, 1.0, 1.1), raw(2, 100, 1.0, 1.1)],
            &config,
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.stats().dropped_duplicates, 0);
    }

    #[test]
    fn test_empty_input() {
        let config = base_config();
        let series = normalize(Vec::new(), &config).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.total_duration_ns(), 0);
    }

    #[test]
    fn test_csv_config_unused_in_normalize() {
        // normalization only reads policy fields; input selection is the
        // pipeline's concern
        let mut config = base_config();
        config.demo = false;
        config.csv = Some(CsvConfig {
            path: "/tmp/ticks.csv".into(),
        });
        assert!(normalize(vec![raw(1, 1, 1.0, 1.1)], &config).is_ok());
    }
}
