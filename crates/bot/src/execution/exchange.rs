//! Collaborator seams of the auto-renew controller.
//!
//! The controller only talks to the outside world through these two traits,
//! so tests substitute in-memory fakes and production wires the Bitfinex and
//! Telegram clients.

use async_trait::async_trait;

use crate::errors::RenewError;
use crate::types::{
    AutoFundingConfig, AutoFundingRequest, Candle, CandleQuery, FundingOffer, ReferenceRate,
};

/// Funding-market data and auto-renew management on a lending exchange.
#[async_trait]
pub trait FundingExchange: Send + Sync {
    /// `true` when the platform accepts requests, `false` during maintenance.
    async fn platform_operative(&self) -> Result<bool, RenewError>;

    /// Latest reference (flash-return) rate, daily fraction.
    async fn get_reference_rate(&self, currency: &str) -> Result<ReferenceRate, RenewError>;

    async fn get_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, RenewError>;

    /// Active auto-renew configuration, `None` when the slot is off.
    async fn get_auto_funding_status(
        &self,
        currency: &str,
    ) -> Result<Option<AutoFundingConfig>, RenewError>;

    async fn get_open_offers(&self, currency: &str) -> Result<Vec<FundingOffer>, RenewError>;

    async fn set_auto_funding(&self, request: &AutoFundingRequest) -> Result<(), RenewError>;

    async fn cancel_all_offers(&self, currency: &str) -> Result<(), RenewError>;
}

/// Operator notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), RenewError>;
}
