//! Volume-weighted rank search over a [`RangeSet`].
//!
//! `V(x)` is the volume traded at rates `<= x`, assuming each range's volume
//! is spread evenly over its integer points. `Rank(x) = V(x) / total`. The
//! resolver binary-searches the scaled rate whose rank is closest to the
//! configured target.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use tracing::debug;

use super::range_aggregator::{RangeSet, RateRange};
use crate::errors::RenewError;
use crate::types::Scaled;

/// Outcome of one binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankSearch {
    /// Best scaled rate found.
    pub rate: Scaled,
    /// Rank at `rate` (1e8-scaled, 1e8 = 100%).
    pub rank: Scaled,
    pub iterations: u32,
    pub exact: bool,
}

/// Cumulative volume at or below the scaled rate `x`.
///
/// Ranges must be sorted by `low`; iteration stops at the first range
/// starting above `x`. Partial ranges contribute
/// `volume * (x - low + 1) / (high - low + 1)` with floor division.
pub fn cumulative_volume(ranges: &[RateRange], x: Scaled) -> U256 {
    let x = x.raw();
    let one = U256::from(1u64);
    let mut acc = U256::ZERO;
    for range in ranges {
        let (low, high, volume) = (range.low.raw(), range.high.raw(), range.volume.raw());
        if low > x {
            break;
        }
        if x >= high {
            acc += volume;
        } else {
            acc += volume * (x - low + one) / (high - low + one);
        }
    }
    acc
}

/// `Rank(x)` as a 1e8-scaled fraction of the total volume.
pub fn rank_at(set: &RangeSet, x: Scaled) -> Scaled {
    let v = cumulative_volume(set.ranges(), x);
    Scaled(v * Scaled::ONE.raw() / set.total_volume().raw())
}

/// Binary search over `[lowest_rate, highest_rate]` for the rate whose rank
/// is closest to `target`.
///
/// The first candidate seen is kept on ties; a later one replaces it only when
/// strictly closer. An exact match ends the search.
pub fn search(set: &RangeSet, target: Scaled) -> Option<RankSearch> {
    let mut start = set.lowest_rate().raw();
    let mut end = set.highest_rate().raw();
    let mut best: Option<(Scaled, Scaled, Scaled)> = None;
    let mut iterations = 0u32;
    let mut exact = false;

    while start <= end {
        iterations += 1;
        let mid = Scaled((start + end) / U256::from(2u64));
        let rank = rank_at(set, mid);
        let diff = rank.abs_diff(target);

        match best {
            Some((_, _, best_diff)) if diff >= best_diff => {}
            _ => best = Some((mid, rank, diff)),
        }

        if diff.raw().is_zero() {
            exact = true;
            break;
        }

        if target < rank {
            match mid.raw().checked_sub(U256::from(1u64)) {
                Some(e) => end = e,
                None => break,
            }
        } else {
            start = mid.raw() + U256::from(1u64);
        }
    }

    best.map(|(rate, rank, _)| RankSearch {
        rate,
        rank,
        iterations,
        exact,
    })
}

/// Resolves a configured rank into a daily lending rate within bounds.
#[derive(Debug, Clone)]
pub struct RankRateResolver {
    rate_min: Decimal,
    rate_max: Decimal,
}

impl RankRateResolver {
    pub fn new(rate_min: Decimal, rate_max: Decimal) -> Self {
        Self { rate_min, rate_max }
    }

    /// Search for `rank` (a fraction in `[0, 1]`) and clamp the result.
    pub fn resolve(&self, set: &RangeSet, rank: Decimal) -> Result<Decimal, RenewError> {
        let target = Scaled::from_decimal(rank)
            .ok_or_else(|| RenewError::Validation(format!("rank {rank} cannot be scaled")))?;
        let found = search(set, target)
            .ok_or_else(|| RenewError::Validation("rank search ran over an empty range".into()))?;
        let raw_rate = found
            .rate
            .to_decimal()
            .ok_or_else(|| RenewError::Validation(format!("rate {:?} out of range", found.rate)))?;
        let rate = raw_rate.max(self.rate_min).min(self.rate_max);

        debug!(
            target_rank = %rank,
            found_rank = %found.rank,
            raw_rate = %raw_rate,
            rate = %rate,
            iterations = found.iterations,
            exact = found.exact,
            "rank search complete"
        );

        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn range(low: u64, high: u64, volume: u64) -> RateRange {
        RateRange::new(Scaled::from(low), Scaled::from(high), Scaled::from(volume))
    }

    fn set(ranges: Vec<RateRange>) -> RangeSet {
        RangeSet::from_sorted(ranges).unwrap()
    }

    fn pct(n: u64) -> Scaled {
        Scaled::from(n * 1_000_000)
    }

    #[test]
    fn test_single_point_exact_match() {
        let s = set(vec![range(100, 100, 10)]);
        let found = search(&s, Scaled::ONE).unwrap();
        assert_eq!(found.rate, Scaled::from(100u64));
        assert!(found.exact);
        assert_eq!(found.iterations, 1);
    }

    #[test]
    fn test_linear_interpolation_midpoint() {
        let s = set(vec![range(0, 9, 10)]);
        assert_eq!(cumulative_volume(s.ranges(), Scaled::from(4u64)), U256::from(5u64));
        let found = search(&s, pct(50)).unwrap();
        assert_eq!(found.rate, Scaled::from(4u64));
        assert!(found.exact);
    }

    #[test]
    fn test_full_rank_climbs_to_highest() {
        let s = set(vec![range(0, 9, 10)]);
        let found = search(&s, pct(100)).unwrap();
        assert_eq!(found.rate, Scaled::from(9u64));
        assert_eq!(found.iterations, 4);
    }

    #[test]
    fn test_zero_rank_stops_at_bottom() {
        let s = set(vec![range(0, 9, 10)]);
        let found = search(&s, Scaled::ZERO).unwrap();
        assert_eq!(found.rate, Scaled::ZERO);
        assert!(!found.exact);
    }

    #[test]
    fn test_tie_keeps_first_candidate() {
        // Every probe between the two points ranks 50%; the first probe wins.
        let s = set(vec![range(0, 0, 1), range(10, 10, 1)]);
        let found = search(&s, pct(25)).unwrap();
        assert_eq!(found.rate, Scaled::from(5u64));
    }

    #[test]
    fn test_partial_contribution_floors() {
        let ranges = [range(0, 2, 10)];
        // 10 * 1 / 3 = 3.33 → 3
        assert_eq!(cumulative_volume(&ranges, Scaled::from(0u64)), U256::from(3u64));
        // 10 * 2 / 3 = 6.67 → 6
        assert_eq!(cumulative_volume(&ranges, Scaled::from(1u64)), U256::from(6u64));
        assert_eq!(cumulative_volume(&ranges, Scaled::from(2u64)), U256::from(10u64));
    }

    #[test]
    fn test_cumulative_volume_is_monotone() {
        let s = set(vec![
            range(3, 12, 7),
            range(5, 5, 4),
            range(8, 30, 11),
            range(20, 25, 9),
        ]);
        let mut prev = U256::ZERO;
        for x in 0u64..=40 {
            let v = cumulative_volume(s.ranges(), Scaled::from(x));
            assert!(v >= prev, "V({x}) = {v} < {prev}");
            prev = v;
        }
        assert_eq!(prev, s.total_volume().raw());
    }

    #[test]
    fn test_resolve_descales() {
        let s = set(vec![range(30_000, 30_000, 10)]);
        let resolver = RankRateResolver::new(dec!(0), dec!(1));
        assert_eq!(resolver.resolve(&s, dec!(1)).unwrap(), dec!(0.0003));
    }

    #[test]
    fn test_resolve_clamps_to_bounds() {
        let s = set(vec![range(1_000, 90_000, 100)]);
        let resolver = RankRateResolver::new(dec!(0.0002), dec!(0.0005));
        for rank in [dec!(0), dec!(0.1), dec!(0.5), dec!(0.9), dec!(1)] {
            let rate = resolver.resolve(&s, rank).unwrap();
            assert!(rate >= dec!(0.0002) && rate <= dec!(0.0005), "rank {rank} → {rate}");
        }
        assert_eq!(resolver.resolve(&s, dec!(0)).unwrap(), dec!(0.0002));
        assert_eq!(resolver.resolve(&s, dec!(1)).unwrap(), dec!(0.0005));
    }
}
