//! Inter-tick gap measurement and coverage.
//!
//! Scans consecutive tick pairs for intervals above the configured
//! threshold. With weekend trimming, a gap lying entirely inside the
//! Saturday 00:00 - Monday 00:00 UTC window is recorded for audit but
//! not flagged, so scheduled market closures do not count as defects.

use chrono::{DateTime, Datelike, Utc, Weekday};
use tracing::debug;

use crate::normalizer::NormalizedTickSeries;
use tickframe_core::{GapRecord, RunConfig, TimestampNs, NS_PER_SEC};

const DAY_NS: i64 = 86_400 * NS_PER_SEC;

/// Result of one gap scan.
#[derive(Debug, Clone)]
pub struct GapAnalysis {
    /// Intervals whose raw duration exceeded the threshold.
    pub records: Vec<GapRecord>,
    /// Sum of flagged gap durations.
    pub flagged_duration_ns: i64,
    /// Largest inter-tick interval observed.
    pub max_gap_ns: i64,
    /// Wall-time span of the series.
    pub total_duration_ns: i64,
    /// 100 x (1 - flagged / total), in [0, 100].
    pub coverage_percent: f64,
}

impl GapAnalysis {
    /// Number of flagged records.
    pub fn n_flagged(&self) -> u64 {
        self.records
            .iter()
            .filter(|gap| gap.exceeds_threshold)
            .count() as u64
    }

    /// Flagged share of total duration, 0.0 for short series.
    pub fn flagged_ratio(&self) -> f64 {
        if self.total_duration_ns > 0 {
            self.flagged_duration_ns as f64 / self.total_duration_ns as f64
        } else {
            0.0
        }
    }

    /// Sequence ids of the ticks that resume after a flagged gap,
    /// ascending. The bar window containing such a tick carries the
    /// gap flag.
    pub fn flagged_resume_ids(&self) -> Vec<u64> {
        self.records
            .iter()
            .filter(|gap| gap.exceeds_threshold)
            .map(|gap| gap.after_tick_id + 1)
            .collect()
    }
}

/// Scan a normalized series for gaps.
pub fn analyze_gaps(series: &NormalizedTickSeries, config: &RunConfig) -> GapAnalysis {
    let threshold_ns = config.gap_threshold_ns();
    let mut records = Vec::new();
    let mut flagged_duration_ns = 0i64;
    let mut max_gap_ns = 0i64;

    for pair in series.ticks().windows(2) {
        let gap_ns = pair[1].timestamp_ns - pair[0].timestamp_ns;
        max_gap_ns = max_gap_ns.max(gap_ns);
        if gap_ns <= threshold_ns {
            continue;
        }
        let excused =
            config.trim_weekend && within_weekend(pair[0].timestamp_ns, pair[1].timestamp_ns);
        if !excused {
            flagged_duration_ns += gap_ns;
        }
        records.push(GapRecord {
            after_tick_id: pair[0].sequence_id,
            gap_duration_ns: gap_ns,
            exceeds_threshold: !excused,
        });
    }

    let total_duration_ns = series.total_duration_ns();
    let coverage_percent = if total_duration_ns > 0 {
        (100.0 * (1.0 - flagged_duration_ns as f64 / total_duration_ns as f64))
            .clamp(0.0, 100.0)
    } else {
        100.0
    };

    debug!(
        gaps = records.len(),
        flagged = records.iter().filter(|g| g.exceeds_threshold).count(),
        coverage_percent,
        "gap scan complete"
    );

    GapAnalysis {
        records,
        flagged_duration_ns,
        max_gap_ns,
        total_duration_ns,
        coverage_percent,
    }
}

/// Whether `[start, end]` lies entirely within one Saturday 00:00 UTC
/// to Monday 00:00 UTC window.
fn within_weekend(start: TimestampNs, end: TimestampNs) -> bool {
    let day_open = start - start.rem_euclid(DAY_NS);
    let weekend_open = match weekday_of(day_open) {
        Some(Weekday::Sat) => day_open,
        Some(Weekday::Sun) => day_open - DAY_NS,
        _ => return false,
    };
    end <= weekend_open + 2 * DAY_NS
}

fn weekday_of(ts_ns: TimestampNs) -> Option<Weekday> {
    DateTime::<Utc>::from_timestamp(ts_ns.div_euclid(NS_PER_SEC), 0).map(|dt| dt.weekday())
}
