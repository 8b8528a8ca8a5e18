use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;

use crate::constants::{
    DEFAULT_AMOUNT, DEFAULT_APP_NAME, DEFAULT_CANDLE_AGGREGATION, DEFAULT_CANDLE_LIMIT,
    DEFAULT_CANDLE_PERIOD_END, DEFAULT_CANDLE_PERIOD_START, DEFAULT_CANDLE_TIMEFRAME,
    DEFAULT_CURRENCY, DEFAULT_DRY_RUN, DEFAULT_HTTP_TIMEOUT_SECONDS, DEFAULT_LOG_DIR,
    DEFAULT_RANK, DEFAULT_RATE_MAX, DEFAULT_RATE_MIN, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_WINDOW_SECONDS,
};
use crate::core::period_selector::PeriodThresholds;
use crate::types::{CandleQuery, SortOrder};

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub app: AppConfig,
    pub renew: RenewConfig,
    pub secrets: Secrets,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Prefix of operator notifications.
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// renew.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RenewConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Amount to keep lent; `0` lends the whole balance.
    #[serde(with = "rust_decimal::serde::str", default = "default_amount")]
    pub amount: Decimal,
    /// Target volume percentile in `[0, 1]`.
    #[serde(with = "rust_decimal::serde::str", default = "default_rank")]
    pub rank: Decimal,
    #[serde(with = "rust_decimal::serde::str", default = "default_rate_min")]
    pub rate_min: Decimal,
    #[serde(with = "rust_decimal::serde::str", default = "default_rate_max")]
    pub rate_max: Decimal,
    /// Period (days) → minimum daily rate.
    #[serde(default)]
    pub period: PeriodThresholds,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub candles: CandleConfig,
}

impl RenewConfig {
    /// Candle query for this currency.
    pub fn candle_query(&self) -> CandleQuery {
        CandleQuery {
            currency: self.currency.clone(),
            timeframe: self.candles.timeframe.clone(),
            aggregation: self.candles.aggregation,
            period_start: self.candles.period_start,
            period_end: self.candles.period_end,
            limit: self.candles.limit,
            sort: SortOrder::Desc,
        }
    }
}

impl Default for RenewConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            amount: default_amount(),
            rank: default_rank(),
            rate_min: default_rate_min(),
            rate_max: default_rate_max(),
            period: PeriodThresholds::new(),
            window_seconds: default_window_seconds(),
            settle_delay_ms: default_settle_delay_ms(),
            candles: CandleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandleConfig {
    #[serde(default = "default_candle_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_candle_aggregation")]
    pub aggregation: u32,
    #[serde(default = "default_candle_period_start")]
    pub period_start: u32,
    #[serde(default = "default_candle_period_end")]
    pub period_end: u32,
    #[serde(default = "default_candle_limit")]
    pub limit: u32,
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            timeframe: default_candle_timeframe(),
            aggregation: default_candle_aggregation(),
            period_start: default_candle_period_start(),
            period_end: default_candle_period_end(),
            limit: default_candle_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Secrets (environment only)
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Secrets {
    pub bitfinex_api_key: Option<String>,
    pub bitfinex_api_secret: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Secrets {
    pub fn has_bitfinex_credentials(&self) -> bool {
        self.bitfinex_api_key.is_some() && self.bitfinex_api_secret.is_some()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("bitfinex_api_key", &mask(&self.bitfinex_api_key))
            .field("bitfinex_api_secret", &mask(&self.bitfinex_api_secret))
            .field("telegram_token", &mask(&self.telegram_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_dry_run() -> bool {
    DEFAULT_DRY_RUN
}

fn default_http_timeout_seconds() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECONDS
}

fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_amount() -> Decimal {
    DEFAULT_AMOUNT
}

fn default_rank() -> Decimal {
    DEFAULT_RANK
}

fn default_rate_min() -> Decimal {
    DEFAULT_RATE_MIN
}

fn default_rate_max() -> Decimal {
    DEFAULT_RATE_MAX
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_candle_timeframe() -> String {
    DEFAULT_CANDLE_TIMEFRAME.to_string()
}

fn default_candle_aggregation() -> u32 {
    DEFAULT_CANDLE_AGGREGATION
}

fn default_candle_period_start() -> u32 {
    DEFAULT_CANDLE_PERIOD_START
}

fn default_candle_period_end() -> u32 {
    DEFAULT_CANDLE_PERIOD_END
}

fn default_candle_limit() -> u32 {
    DEFAULT_CANDLE_LIMIT
}
