use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{BotConfig, RenewConfig};
use crate::constants::{MAX_PERIOD_DAYS, MIN_PERIOD_DAYS, RATE_FLOOR};

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// `prior` holds violations found while loading (unparsable env overrides).
/// Every violation is collected before failing so the operator sees them all
/// at once. Called automatically by [`super::load_config`].
pub fn validate_config(config: &BotConfig, prior: Vec<String>) -> Result<()> {
    let mut errors = prior;
    errors.extend(renew_violations(&config.renew));

    validate_app_config(config, &mut errors);
    validate_live_mode_requirements(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Renew config
// ---------------------------------------------------------------------------

/// Violations of the auto-renew input rules, empty when valid.
pub fn renew_violations(renew: &RenewConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if renew.currency.is_empty() {
        errors.push("renew: currency is empty".into());
    } else if !renew.currency.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(format!(
            "renew: currency '{}' must be alphanumeric",
            renew.currency
        ));
    }

    if renew.amount < Decimal::ZERO {
        errors.push(format!("renew: amount ({}) must be >= 0", renew.amount));
    }

    if renew.rank < Decimal::ZERO || renew.rank > dec!(1) {
        errors.push(format!("renew: rank ({}) must be within [0, 1]", renew.rank));
    }

    // Rate floor is 0.01%/day (APR 3.65%).
    for (name, rate) in [("rate_min", renew.rate_min), ("rate_max", renew.rate_max)] {
        if rate < RATE_FLOOR {
            errors.push(format!("renew: {name} ({rate}) must be >= {RATE_FLOOR}"));
        }
    }
    if renew.rate_min > renew.rate_max {
        errors.push(format!(
            "renew: rate_min ({}) must be <= rate_max ({})",
            renew.rate_min, renew.rate_max
        ));
    }

    for (period, min_rate) in &renew.period {
        if !(MIN_PERIOD_DAYS..=MAX_PERIOD_DAYS).contains(period) {
            errors.push(format!(
                "renew.period: {period} days outside [{MIN_PERIOD_DAYS}, {MAX_PERIOD_DAYS}]"
            ));
        }
        if *min_rate <= Decimal::ZERO {
            errors.push(format!(
                "renew.period.{period}: minimum rate ({min_rate}) must be > 0"
            ));
        }
    }

    if renew.window_seconds == 0 {
        errors.push("renew: window_seconds must be > 0".into());
    }

    errors
}

// ---------------------------------------------------------------------------
// App config
// ---------------------------------------------------------------------------

fn validate_app_config(config: &BotConfig, errors: &mut Vec<String>) {
    if config.app.http_timeout_seconds == 0 {
        errors.push("app: http_timeout_seconds must be > 0".into());
    }
    if config.app.logging.log_dir.is_empty() {
        errors.push("app.logging: log_dir is empty".into());
    }
}

// ---------------------------------------------------------------------------
// Live mode requirements
// ---------------------------------------------------------------------------

fn validate_live_mode_requirements(config: &BotConfig, errors: &mut Vec<String>) {
    if config.app.dry_run {
        return;
    }

    if config.secrets.bitfinex_api_key.is_none() {
        errors.push("live mode: BITFINEX_API_KEY env var is required when dry_run=false".into());
    }
    if config.secrets.bitfinex_api_secret.is_none() {
        errors.push(
            "live mode: BITFINEX_API_SECRET env var is required when dry_run=false".into(),
        );
    }
}
