//! Human-readable formatting of daily funding rates.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::constants::DAYS_PER_YEAR;

/// Formats a daily rate as `0.030000% (APR: 10.95%)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDisplay(pub Decimal);

impl fmt::Display for RateDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let daily_pct = self.0 * dec!(100);
        let apr_pct = daily_pct * DAYS_PER_YEAR;
        write!(f, "{daily_pct:.6}% (APR: {apr_pct:.2}%)")
    }
}
