//! Bar aggregation over a normalized tick series.
//!
//! One streaming pass per frame: time frames fold ticks into epoch-
//! aligned left-closed windows, count frames into fixed-size blocks in
//! arrival order. State is one open accumulator per frame, independent
//! of total tick count.

use tracing::debug;

use tickframe_core::{window_open, Bar, BarSpec, PriceBasis, Tick, TimestampNs};

/// Completed bars plus bookkeeping for one frame.
#[derive(Debug, Clone)]
pub struct FrameBars {
    /// Frame label, e.g. "1m" or "100t".
    pub label: String,
    /// Bars ascending by `t_open_ns`.
    pub bars: Vec<Bar>,
    /// Ticks in a trailing count-window smaller than N, dropped so
    /// every emitted count bar holds exactly N ticks.
    pub partial_ticks_dropped: u64,
}

/// One open window being aggregated.
struct BarAccumulator {
    t_open_ns: TimestampNs,
    last_ts_ns: TimestampNs,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    o_bid: f64,
    o_ask: f64,
    c_bid: f64,
    c_ask: f64,
    spread_sum: f64,
    v_sum: f64,
    n_ticks: u32,
    tick_first_id: u64,
    tick_last_id: u64,
    gap_flag: bool,
}

impl BarAccumulator {
    fn open(t_open_ns: TimestampNs, tick: &Tick, basis: PriceBasis, gap_flag: bool) -> Self {
        let price = basis.price_of(tick);
        Self {
            t_open_ns,
            last_ts_ns: tick.timestamp_ns,
            o: price,
            h: price,
            l: price,
            c: price,
            o_bid: tick.bid,
            o_ask: tick.ask,
            c_bid: tick.bid,
            c_ask: tick.ask,
            spread_sum: tick.spread(),
            v_sum: tick.volume.unwrap_or(0.0),
            n_ticks: 1,
            tick_first_id: tick.sequence_id,
            tick_last_id: tick.sequence_id,
            gap_flag,
        }
    }

    fn push(&mut self, tick: &Tick, basis: PriceBasis, gap_flag: bool) {
        let price = basis.price_of(tick);
        self.h = self.h.max(price);
        self.l = self.l.min(price);
        self.c = price;
        self.c_bid = tick.bid;
        self.c_ask = tick.ask;
        self.spread_sum += tick.spread();
        self.v_sum += tick.volume.unwrap_or(0.0);
        self.n_ticks += 1;
        self.tick_last_id = tick.sequence_id;
        self.last_ts_ns = tick.timestamp_ns;
        self.gap_flag |= gap_flag;
    }

    fn close(self, symbol: &str, frame: &str, t_close_ns: TimestampNs) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            frame: frame.to_string(),
            t_open_ns: self.t_open_ns,
            t_close_ns,
            o: self.o,
            h: self.h,
            l: self.l,
            c: self.c,
            o_bid: self.o_bid,
            o_ask: self.o_ask,
            c_bid: self.c_bid,
            c_ask: self.c_ask,
            spread_mean: self.spread_sum / self.n_ticks as f64,
            n_ticks: self.n_ticks,
            v_sum: self.v_sum,
            tick_first_id: self.tick_first_id,
            tick_last_id: self.tick_last_id,
            gap_flag: self.gap_flag as u8,
        }
    }
}

/// Builds bars for one or more frames over a shared immutable series.
pub struct BarBuilder<'a> {
    symbol: &'a str,
    basis: PriceBasis,
    /// Sequence ids of ticks that resume after a flagged gap, ascending.
    flagged_resume_ids: &'a [u64],
}

impl<'a> BarBuilder<'a> {
    pub fn new(symbol: &'a str, basis: PriceBasis, flagged_resume_ids: &'a [u64]) -> Self {
        Self {
            symbol,
            basis,
            flagged_resume_ids,
        }
    }

    /// Build all bars of one frame.
    pub fn build(&self, ticks: &[Tick], spec: &BarSpec) -> FrameBars {
        let frame = match spec {
            BarSpec::Time { width_ns, label } => self.build_time(ticks, *width_ns, label),
            BarSpec::TickCount { count, label } => self.build_count(ticks, *count, label),
        };
        debug!(
            frame = %frame.label,
            bars = frame.bars.len(),
            partial_ticks_dropped = frame.partial_ticks_dropped,
            "frame built"
        );
        frame
    }

    fn resumes_after_gap(&self, tick: &Tick) -> bool {
        self.flagged_resume_ids.binary_search(&tick.sequence_id).is_ok()
    }

    fn build_time(&self, ticks: &[Tick], width_ns: i64, label: &str) -> FrameBars {
        let mut bars = Vec::new();
        let mut open: Option<BarAccumulator> = None;

        for tick in ticks {
            let window = window_open(tick.timestamp_ns, width_ns);
            let gap_flag = self.resumes_after_gap(tick);
            match &mut open {
                Some(acc) if acc.t_open_ns == window => acc.push(tick, self.basis, gap_flag),
                _ => {
                    if let Some(acc) = open.take() {
                        let close_ns = acc.t_open_ns + width_ns - 1;
                        bars.push(acc.close(self.symbol, label, close_ns));
                    }
                    open = Some(BarAccumulator::open(window, tick, self.basis, gap_flag));
                }
            }
        }
        if let Some(acc) = open.take() {
            let close_ns = acc.t_open_ns + width_ns - 1;
            bars.push(acc.close(self.symbol, label, close_ns));
        }

        FrameBars {
            label: label.to_string(),
            bars,
            partial_ticks_dropped: 0,
        }
    }

    fn build_count(&self, ticks: &[Tick], count: u64, label: &str) -> FrameBars {
        let block = count as usize;
        let chunks = ticks.chunks_exact(block);
        // trailing block smaller than N is dropped, not emitted
        let partial_ticks_dropped = chunks.remainder().len() as u64;

        let mut bars = Vec::with_capacity(ticks.len() / block);
        for chunk in chunks {
            let first = &chunk[0];
            let mut acc = BarAccumulator::open(
                first.timestamp_ns,
                first,
                self.basis,
                self.resumes_after_gap(first),
            );
            for tick in &chunk[1..] {
                acc.push(tick, self.basis, self.resumes_after_gap(tick));
            }
            let close_ns = acc.last_ts_ns;
            bars.push(acc.close(self.symbol, label, close_ns));
        }

        FrameBars {
            label: label.to_string(),
            bars,
            partial_ticks_dropped,
        }
    }
}
