//! Fixed-point newtype for the volume-weighted rank search.
//!
//! Rates and volumes are scaled by 1e8 into 256-bit unsigned integers so the
//! cumulative-volume arithmetic is exact and every division floors.

use alloy_primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::fmt;
use std::str::FromStr;

use crate::constants::FIXED_POINT_SCALE;

const SCALE_DECIMAL: Decimal = dec!(100_000_000);

/// 1e8-scaled non-negative value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scaled(pub U256);

impl Scaled {
    pub const ZERO: Scaled = Scaled(U256::ZERO);
    pub const ONE: Scaled = Scaled(U256::from_limbs([FIXED_POINT_SCALE, 0, 0, 0]));

    /// Scale a non-negative `Decimal` by 1e8, rounding half away from zero.
    ///
    /// Returns `None` for negative input or values too large for `Decimal`
    /// after scaling.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO {
            return None;
        }
        let scaled = value
            .checked_mul(SCALE_DECIMAL)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        scaled.to_u128().map(|raw| Self(U256::from(raw)))
    }

    /// Convert back to an off-chain `Decimal`.
    pub fn to_decimal(self) -> Option<Decimal> {
        let raw = Decimal::from_str(&self.0.to_string()).ok()?;
        Some(raw / SCALE_DECIMAL)
    }

    /// Inner `U256`.
    pub fn raw(self) -> U256 {
        self.0
    }

    /// `|self - other|` without underflow.
    pub fn abs_diff(self, other: Scaled) -> Scaled {
        if self.0 >= other.0 {
            Scaled(self.0 - other.0)
        } else {
            Scaled(other.0 - self.0)
        }
    }
}

impl fmt::Debug for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scaled({})", self.0)
    }
}

impl fmt::Display for Scaled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(d) => write!(f, "{d}"),
            None => write!(f, "{}e-8", self.0),
        }
    }
}

impl From<U256> for Scaled {
    fn from(val: U256) -> Self {
        Self(val)
    }
}

impl From<u64> for Scaled {
    /// Treats the argument as already scaled.
    fn from(val: u64) -> Self {
        Self(U256::from(val))
    }
}
