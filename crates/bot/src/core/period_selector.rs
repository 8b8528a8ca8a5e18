//! Lending-period selection from a rate threshold table.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::constants::{MAX_PERIOD_DAYS, MIN_PERIOD_DAYS};

/// Period (days) → minimum daily rate that justifies lending that long.
pub type PeriodThresholds = BTreeMap<u32, Decimal>;

/// Longest period whose threshold the rate meets, clamped to the exchange's
/// allowed range. Falls back to the shortest period.
pub fn select_period(thresholds: &PeriodThresholds, rate: Decimal) -> u32 {
    thresholds
        .iter()
        .rev()
        .find(|(_, min_rate)| rate >= **min_rate)
        .map(|(period, _)| *period)
        .unwrap_or(MIN_PERIOD_DAYS)
        .clamp(MIN_PERIOD_DAYS, MAX_PERIOD_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn table() -> PeriodThresholds {
        BTreeMap::from([(2, dec!(0.0001)), (30, dec!(0.0003)), (120, dec!(0.0005))])
    }

    #[test]
    fn test_picks_longest_met_threshold() {
        assert_eq!(select_period(&table(), dec!(0.00035)), 30);
        assert_eq!(select_period(&table(), dec!(0.0003)), 30);
        assert_eq!(select_period(&table(), dec!(0.0005)), 120);
        assert_eq!(select_period(&table(), dec!(0.0002)), 2);
    }

    #[test]
    fn test_below_every_threshold_defaults() {
        assert_eq!(select_period(&table(), dec!(0.00005)), 2);
    }

    #[test]
    fn test_empty_table_defaults() {
        assert_eq!(select_period(&PeriodThresholds::new(), dec!(0.01)), 2);
    }

    #[test]
    fn test_result_is_clamped() {
        let t = BTreeMap::from([(1, dec!(0)), (365, dec!(0.001))]);
        assert_eq!(select_period(&t, dec!(0.0001)), 2);
        assert_eq!(select_period(&t, dec!(0.002)), 120);
    }

    #[test]
    fn test_higher_rate_never_shortens_period() {
        let t = table();
        let mut prev = 0;
        for bp in 0..80u32 {
            let rate = Decimal::new(bp as i64, 5);
            let period = select_period(&t, rate);
            assert!(period >= prev);
            prev = period;
        }
    }
}
