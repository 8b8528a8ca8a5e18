//! Candle → volume-weighted rate range aggregation.
//!
//! Each in-window candle with traded volume becomes one [`RateRange`]
//! spanning its min..max rate. Ranges are sorted by `(low, high, volume)` and
//! entries with identical bounds are merged by an adjacency-only pass.

use alloy_primitives::U256;
use tracing::{debug, warn};

use crate::types::{Candle, Scaled};

/// Rate extent of one or more candles with their combined volume.
///
/// All fields are 1e8-scaled. Field order gives the `(low, high, volume)`
/// sort order through the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RateRange {
    pub low: Scaled,
    pub high: Scaled,
    pub volume: Scaled,
}

impl RateRange {
    pub fn new(low: Scaled, high: Scaled, volume: Scaled) -> Self {
        Self { low, high, volume }
    }

    fn same_bounds(&self, other: &RateRange) -> bool {
        self.low == other.low && self.high == other.high
    }
}

/// Sorted, merged ranges plus their summary statistics.
///
/// Never empty and always carries a positive total volume.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSet {
    ranges: Vec<RateRange>,
    lowest_rate: Scaled,
    highest_rate: Scaled,
    total_volume: Scaled,
}

impl RangeSet {
    /// Build from ranges that are already sorted and merged.
    ///
    /// Returns `None` when there is nothing to search: no ranges, or no
    /// volume left after scaling.
    pub fn from_sorted(ranges: Vec<RateRange>) -> Option<Self> {
        let first = ranges.first()?;
        let mut lowest = first.low;
        let mut highest = first.high;
        let mut total = U256::ZERO;
        for range in &ranges {
            if range.low < lowest {
                lowest = range.low;
            }
            if range.high > highest {
                highest = range.high;
            }
            total += range.volume.raw();
        }
        if total.is_zero() {
            return None;
        }
        Some(Self {
            ranges,
            lowest_rate: lowest,
            highest_rate: highest,
            total_volume: Scaled(total),
        })
    }

    pub fn ranges(&self) -> &[RateRange] {
        &self.ranges
    }

    pub fn lowest_rate(&self) -> Scaled {
        self.lowest_rate
    }

    pub fn highest_rate(&self) -> Scaled {
        self.highest_rate
    }

    pub fn total_volume(&self) -> Scaled {
        self.total_volume
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }
}

/// Aggregate candles into a [`RangeSet`].
///
/// Candles older than `cutoff_ms` or without volume are discarded. `None`
/// means "no data": the caller must not change anything.
pub fn aggregate(candles: &[Candle], cutoff_ms: i64) -> Option<RangeSet> {
    let mut ranges: Vec<RateRange> = candles
        .iter()
        .filter(|c| c.timestamp >= cutoff_ms && c.volume > rust_decimal::Decimal::ZERO)
        .filter_map(candle_to_range)
        .collect();

    ranges.sort();
    let before = ranges.len();
    merge_adjacent(&mut ranges);

    debug!(
        candles = candles.len(),
        ranges = before,
        merged = ranges.len(),
        cutoff_ms,
        "candles aggregated"
    );

    RangeSet::from_sorted(ranges)
}

/// Fold each entry into its predecessor when both share `(low, high)`.
///
/// Only the immediately preceding entry is compared, and the same index is
/// re-examined after a removal. Entries whose scaled volume is zero are
/// dropped (except the first). Equal-bound entries that are not adjacent are
/// left alone.
pub fn merge_adjacent(ranges: &mut Vec<RateRange>) {
    let mut i = 1;
    while i < ranges.len() {
        let current = ranges[i];
        if !current.volume.raw().is_zero() {
            let prev = ranges[i - 1];
            if !current.same_bounds(&prev) {
                i += 1;
                continue;
            }
            ranges[i - 1].volume = Scaled(prev.volume.raw() + current.volume.raw());
        }
        ranges.remove(i);
    }
}

fn candle_to_range(candle: &Candle) -> Option<RateRange> {
    let scaled = [candle.open, candle.close, candle.high, candle.low]
        .into_iter()
        .map(Scaled::from_decimal)
        .collect::<Option<Vec<_>>>();
    let volume = Scaled::from_decimal(candle.volume);

    match (scaled, volume) {
        (Some(points), Some(volume)) => {
            let low = points.iter().copied().min()?;
            let high = points.iter().copied().max()?;
            Some(RateRange::new(low, high, volume))
        }
        _ => {
            warn!(
                timestamp = candle.timestamp,
                "skipping candle with negative or out-of-range values"
            );
            None
        }
    }
}
