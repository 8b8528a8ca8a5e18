pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::core::period_selector::PeriodThresholds;

/// Load and merge the config JSON files into a single [`BotConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   renew.json
/// ```
///
/// # Environment variable overrides
///
/// | Env Var            | Config Field                  |
/// |--------------------|-------------------------------|
/// | `EXECUTOR_DRY_RUN` | `app.dry_run`                 |
/// | `INPUT_CURRENCY`   | `renew.currency`              |
/// | `INPUT_AMOUNT`     | `renew.amount`                |
/// | `INPUT_RANK`       | `renew.rank`                  |
/// | `INPUT_RATE_MIN`   | `renew.rate_min`              |
/// | `INPUT_RATE_MAX`   | `renew.rate_max`              |
/// | `INPUT_PERIOD`     | `renew.period` (JSON object)  |
///
/// Credentials never live in the JSON files; they are read from
/// `BITFINEX_API_KEY`, `BITFINEX_API_SECRET`, `TELEGRAM_TOKEN` and
/// `TELEGRAM_CHAT_ID`.
pub fn load_config(config_dir: &Path) -> Result<BotConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let renew: RenewConfig =
        serde_json::from_str(&read("renew.json")?).context("parsing renew.json")?;

    let mut config = BotConfig {
        app,
        renew,
        secrets: read_secrets(),
    };

    let override_errors = apply_env_overrides(&mut config);
    validate::validate_config(&config, override_errors)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Values that fail to parse are
/// returned as violations so the load fails instead of running on the JSON
/// value.
fn apply_env_overrides(config: &mut BotConfig) -> Vec<String> {
    let mut errors = Vec::new();

    // -- App -----------------------------------------------------------------
    if let Some(val) = env_bool("EXECUTOR_DRY_RUN") {
        info!(dry_run = val, "env override: EXECUTOR_DRY_RUN");
        config.app.dry_run = val;
    }

    // -- Renew ---------------------------------------------------------------
    if let Some(val) = env_string("INPUT_CURRENCY") {
        info!(currency = %val, "env override: INPUT_CURRENCY");
        config.renew.currency = val;
    }

    if let Some(val) = env_decimal("INPUT_AMOUNT", &mut errors) {
        info!(%val, "env override: INPUT_AMOUNT");
        config.renew.amount = val;
    }

    if let Some(val) = env_decimal("INPUT_RANK", &mut errors) {
        info!(%val, "env override: INPUT_RANK");
        config.renew.rank = val;
    }

    if let Some(val) = env_decimal("INPUT_RATE_MIN", &mut errors) {
        info!(%val, "env override: INPUT_RATE_MIN");
        config.renew.rate_min = val;
    }

    if let Some(val) = env_decimal("INPUT_RATE_MAX", &mut errors) {
        info!(%val, "env override: INPUT_RATE_MAX");
        config.renew.rate_max = val;
    }

    if let Some(raw) = env_string("INPUT_PERIOD") {
        match parse_period_table(&raw) {
            Ok(val) => {
                info!(entries = val.len(), "env override: INPUT_PERIOD");
                config.renew.period = val;
            }
            Err(e) => errors.push(format!("env INPUT_PERIOD: {e}")),
        }
    }

    errors
}

/// Parse a JSON5 object of period (days) → minimum daily rate.
///
/// Keys may be quoted with either quote style; values may be numbers or
/// numeric strings.
fn parse_period_table(raw: &str) -> Result<PeriodThresholds, String> {
    let entries: BTreeMap<String, Decimal> =
        json5::from_str(raw).map_err(|e| format!("invalid period table '{raw}': {e}"))?;

    entries
        .into_iter()
        .map(|(key, rate)| {
            key.trim()
                .parse::<u32>()
                .map(|period| (period, rate))
                .map_err(|_| format!("period '{key}' is not a whole number of days"))
        })
        .collect()
}

fn read_secrets() -> Secrets {
    Secrets {
        bitfinex_api_key: env_string("BITFINEX_API_KEY"),
        bitfinex_api_secret: env_string("BITFINEX_API_SECRET"),
        telegram_token: env_string("TELEGRAM_TOKEN"),
        telegram_chat_id: env_string("TELEGRAM_CHAT_ID"),
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var as a bool (`true`, `1`, `yes` → true).
fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Read a non-empty env var and parse it as `Decimal`, recording a
/// violation when it does not parse.
fn env_decimal(key: &str, errors: &mut Vec<String>) -> Option<Decimal> {
    let raw = env_string(key)?;
    match Decimal::from_str(raw.trim()) {
        Ok(val) => Some(val),
        Err(e) => {
            errors.push(format!("env {key}: '{raw}' is not a decimal ({e})"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::path::PathBuf;

    const ENV_KEYS: &[&str] = &[
        "EXECUTOR_DRY_RUN",
        "INPUT_CURRENCY",
        "INPUT_AMOUNT",
        "INPUT_RANK",
        "INPUT_RATE_MIN",
        "INPUT_RATE_MAX",
        "INPUT_PERIOD",
        "BITFINEX_API_KEY",
        "BITFINEX_API_SECRET",
        "TELEGRAM_TOKEN",
        "TELEGRAM_CHAT_ID",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    fn project_config_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
    }

    // -----------------------------------------------------------------------
    // Helper: write a minimal set of config JSON files to a temp dir.
    // -----------------------------------------------------------------------

    fn write_test_configs(dir: &Path) {
        std::fs::write(
            dir.join("app.json"),
            r#"{
                "name": "renew-test",
                "dry_run": true,
                "http_timeout_seconds": 5,
                "logging": { "log_dir": "logs" }
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("renew.json"),
            r#"{
                "currency": "USD",
                "amount": "100",
                "rank": "0.8",
                "rate_min": "0.0002",
                "rate_max": "0.005",
                "period": { "2": "0.0001", "30": "0.0003", "120": "0.0005" }
            }"#,
        )
        .unwrap();
    }

    #[test]
    #[serial]
    fn test_load_minimal_config() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.app.name, "renew-test");
        assert!(config.app.dry_run);
        assert_eq!(config.renew.amount, dec!(100));
        assert_eq!(config.renew.rank, dec!(0.8));
        assert_eq!(config.renew.period.len(), 3);
        assert_eq!(config.renew.settle_delay_ms, 1_000);
        assert!(config.secrets.bitfinex_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_project_config_loads() {
        clear_env();
        std::env::set_var("EXECUTOR_DRY_RUN", "true");
        let config = load_config(&project_config_dir()).unwrap();
        assert_eq!(config.renew.currency, "USD");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("INPUT_CURRENCY", "UST");
        std::env::set_var("INPUT_AMOUNT", "250.5");
        std::env::set_var("INPUT_RANK", "0.25");
        std::env::set_var("INPUT_RATE_MAX", "0.002");
        std::env::set_var("INPUT_PERIOD", r#"{"10": 0.0002}"#);

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.renew.currency, "UST");
        assert_eq!(config.renew.amount, dec!(250.5));
        assert_eq!(config.renew.rank, dec!(0.25));
        assert_eq!(config.renew.rate_max, dec!(0.002));
        assert_eq!(config.renew.period.get(&10), Some(&dec!(0.0002)));
        assert_eq!(config.renew.period.len(), 1);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_override_fails_load() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("INPUT_RATE_MAX", "0.5%");
        std::env::set_var("INPUT_RANK", "half");

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("2 errors"), "{err}");
        assert!(err.contains("INPUT_RATE_MAX"), "{err}");
        assert!(err.contains("INPUT_RANK"), "{err}");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_period_override_fails_load() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("INPUT_PERIOD", "not json");

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("INPUT_PERIOD"), "{err}");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_period_override_accepts_json5() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var(
            "INPUT_PERIOD",
            "{ '2': 0.0001, \"30\": '0.0003', /* long */ '120': 0.0005, }",
        );

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(
            config.renew.period,
            BTreeMap::from([(2, dec!(0.0001)), (30, dec!(0.0003)), (120, dec!(0.0005))])
        );

        clear_env();
    }

    #[test]
    fn test_period_table_rejects_non_numeric_key() {
        let err = parse_period_table("{ 'week': 0.0002 }").unwrap_err();
        assert!(err.contains("week"), "{err}");
    }

    #[test]
    #[serial]
    fn test_invalid_override_fails_validation() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("INPUT_RATE_MIN", "0.00001");

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("rate_min"), "{err}");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_live_mode_reads_credentials_from_env() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("EXECUTOR_DRY_RUN", "false");
        assert!(load_config(tmp.path()).is_err());

        std::env::set_var("BITFINEX_API_KEY", "key");
        std::env::set_var("BITFINEX_API_SECRET", "secret");
        let config = load_config(tmp.path()).unwrap();
        assert!(!config.app.dry_run);
        assert!(config.secrets.has_bitfinex_credentials());

        clear_env();
    }

    #[test]
    fn test_missing_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("app.json"));
    }
}
