use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rate::RateDisplay;

/// On/off flag of the exchange's per-currency auto-renew slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoFundingStatus {
    On,
    Off,
}

impl AutoFundingStatus {
    /// Wire flag used by the exchange (`1` = on, `0` = off).
    pub fn as_flag(&self) -> u8 {
        match self {
            Self::On => 1,
            Self::Off => 0,
        }
    }
}

/// Auto-renew configuration currently active on the exchange.
///
/// The exchange only reports an active configuration; a disabled slot is
/// represented by `None` at the call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFundingConfig {
    pub currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Daily rate as a fraction (0.0003 = 0.03%/day).
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    pub period: u32,
}

/// Mutation request for the auto-renew slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoFundingRequest {
    pub currency: String,
    pub status: AutoFundingStatus,
    pub amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub period: Option<u32>,
}

impl AutoFundingRequest {
    /// Turn the auto-renew slot off.
    pub fn disable(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            status: AutoFundingStatus::Off,
            amount: None,
            rate: None,
            period: None,
        }
    }

    /// Turn the auto-renew slot on with the given target.
    pub fn enable(currency: &str, target: &TargetConfig) -> Self {
        Self {
            currency: currency.to_string(),
            status: AutoFundingStatus::On,
            amount: Some(target.amount),
            rate: Some(target.rate),
            period: Some(target.period),
        }
    }
}

/// An open lending offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingOffer {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    pub period: u32,
}

/// Latest market reference (flash-return) rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRate {
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
}

/// Auto-renew parameters computed for one run. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    pub period: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

impl fmt::Display for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate {}, period {} days, amount {}",
            RateDisplay(self.rate),
            self.period,
            self.amount
        )
    }
}

/// One mutation or follow-up of the apply pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStep {
    /// Switch the current auto-renew config off.
    DisableCurrent,
    /// Cancel every open lending offer for the currency.
    CancelOffers,
    /// Submit the new auto-renew config.
    SubmitConfig,
    /// Wait for the settle delay and sum the placed offers.
    Verify,
    /// Tell the operator what was applied.
    Notify,
}

impl ApplyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisableCurrent => "disable current auto-renew",
            Self::CancelOffers => "cancel open offers",
            Self::SubmitConfig => "submit auto-renew config",
            Self::Verify => "verify placed offers",
            Self::Notify => "notify operator",
        }
    }

    /// Whether a failure of this step aborts the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DisableCurrent | Self::CancelOffers | Self::SubmitConfig
        )
    }
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_enable_request_carries_target() {
        let target = TargetConfig {
            rate: dec!(0.00025),
            period: 7,
            amount: dec!(500),
        };
        let req = AutoFundingRequest::enable("UST", &target);
        assert_eq!(req.status.as_flag(), 1);
        assert_eq!(req.rate, Some(dec!(0.00025)));
        assert_eq!(req.period, Some(7));
        assert_eq!(req.amount, Some(dec!(500)));
    }

    #[test]
    fn test_disable_request_has_no_parameters() {
        let req = AutoFundingRequest::disable("USD");
        assert_eq!(req.status, AutoFundingStatus::Off);
        assert!(req.amount.is_none() && req.rate.is_none() && req.period.is_none());
    }

    #[test]
    fn test_only_exchange_mutations_are_fatal() {
        assert!(ApplyStep::DisableCurrent.is_fatal());
        assert!(ApplyStep::CancelOffers.is_fatal());
        assert!(ApplyStep::SubmitConfig.is_fatal());
        assert!(!ApplyStep::Verify.is_fatal());
        assert!(!ApplyStep::Notify.is_fatal());
    }
}
