//! Deterministic synthetic tick source for demo runs.
//!
//! Generates a one-hour EURUSD-style random walk starting on a weekday,
//! fully reproducible from the configured seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tickframe_core::{RawTick, NS_PER_SEC};

/// Number of ticks in a demo run.
pub const DEMO_TICK_COUNT: usize = 7_200;

/// 2024-01-02T00:00:00Z, a Tuesday.
const DEMO_START_NS: i64 = 1_704_153_600 * NS_PER_SEC;

/// 500 ms between ticks.
const DEMO_SPACING_NS: i64 = NS_PER_SEC / 2;

/// Constant quoted spread of one pip.
const DEMO_SPREAD: f64 = 0.0001;

/// Generate the demo tick series for a seed.
///
/// Identical seeds produce identical vectors; the series is strictly
/// increasing in time, gap-free and never crosses.
pub fn demo_ticks(seed: u64) -> Vec<RawTick> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mid = 1.1000_f64;

    (0..DEMO_TICK_COUNT)
        .map(|i| {
            mid = (mid + rng.gen_range(-5.0e-5..5.0e-5)).clamp(1.0, 1.2);
            RawTick {
                row: i as u64 + 1,
                timestamp_ns: DEMO_START_NS + i as i64 * DEMO_SPACING_NS,
                bid: mid - DEMO_SPREAD / 2.0,
                ask: mid + DEMO_SPREAD / 2.0,
                volume: Some(rng.gen_range(0.5..1.5)),
            }
        })
        .collect()
}
