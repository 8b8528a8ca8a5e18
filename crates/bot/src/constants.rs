use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Numeric Constants
// ---------------------------------------------------------------------------

/// Fixed-point scale (1e8) of the rank search.
pub const FIXED_POINT_SCALE: u64 = 100_000_000;

/// Days per year used when annualising daily funding rates.
pub const DAYS_PER_YEAR: Decimal = dec!(365);

/// Smallest rate accepted for either rate bound: 0.01%/day (APR 3.65%).
pub const RATE_FLOOR: Decimal = dec!(0.0001);

/// `f64::EPSILON` as a `Decimal`: tolerance of the unchanged-config check.
pub const FLOAT_EPSILON: Decimal = dec!(0.0000000000000002220446049250);

// ---------------------------------------------------------------------------
// Lending periods (days)
// ---------------------------------------------------------------------------

pub const MIN_PERIOD_DAYS: u32 = 2;
pub const MAX_PERIOD_DAYS: u32 = 120;

// ---------------------------------------------------------------------------
// Bitfinex endpoints
// ---------------------------------------------------------------------------

pub const BITFINEX_PUBLIC_BASE: &str = "https://api-pub.bitfinex.com";
pub const BITFINEX_AUTH_BASE: &str = "https://api.bitfinex.com";
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_APP_NAME: &str = "funding-renew-bot";
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_AMOUNT: Decimal = dec!(0);
pub const DEFAULT_RANK: Decimal = dec!(0.5);
pub const DEFAULT_RATE_MIN: Decimal = dec!(0.0002);
pub const DEFAULT_RATE_MAX: Decimal = dec!(0.01);

/// Trailing candle window: one day plus one second of slack.
pub const DEFAULT_WINDOW_SECONDS: u64 = 86_401;

/// Wait between submitting the config and reading back the placed offers.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

pub const DEFAULT_CANDLE_TIMEFRAME: &str = "1m";
pub const DEFAULT_CANDLE_AGGREGATION: u32 = 30;
pub const DEFAULT_CANDLE_PERIOD_START: u32 = 2;
pub const DEFAULT_CANDLE_PERIOD_END: u32 = 30;
/// One day of 1m candles plus one.
pub const DEFAULT_CANDLE_LIMIT: u32 = 1_441;

pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_DRY_RUN: bool = false;
