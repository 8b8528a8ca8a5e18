use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use funding_renew_bot::config;
use funding_renew_bot::core::controller::{AutoRenewController, RunOutcome};
use funding_renew_bot::execution::bitfinex_client::BitfinexClient;
use funding_renew_bot::execution::exchange::Notifier;
use funding_renew_bot::execution::telegram::{LogNotifier, TelegramNotifier};
use funding_renew_bot::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    // Determine config directory, default `./config`.
    let config_dir = std::env::var("BOT_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    info!(
        app = %config.app.name,
        currency = %config.renew.currency,
        dry_run = config.app.dry_run,
        authenticated = config.secrets.has_bitfinex_credentials(),
        "funding auto-renew starting"
    );

    let timeout = Duration::from_secs(config.app.http_timeout_seconds);
    let secrets = config.secrets.clone();

    let exchange = Arc::new(
        BitfinexClient::new(timeout, secrets.bitfinex_api_key, secrets.bitfinex_api_secret)
            .context("building Bitfinex client")?,
    );

    let notifier: Arc<dyn Notifier> = if secrets.telegram_token.is_some() {
        Arc::new(
            TelegramNotifier::new(timeout, secrets.telegram_token, secrets.telegram_chat_id)
                .context("building Telegram notifier")?,
        )
    } else {
        info!("TELEGRAM_TOKEN not set, notifications go to the log only");
        Arc::new(LogNotifier)
    };

    let controller = AutoRenewController::new(
        exchange,
        notifier,
        config.renew.clone(),
        config.app.name.clone(),
        config.app.dry_run,
    )?;

    match controller.run().await {
        Ok(RunOutcome::NoOp { reason }) => {
            info!(?reason, "auto-renew unchanged");
        }
        Ok(RunOutcome::Applied(report)) => {
            info!(
                target = %report.target,
                placed = ?report.placed_amount,
                notified = report.notified,
                "auto-renew applied"
            );
        }
        Ok(RunOutcome::DryRun { target, steps }) => {
            info!(target = %target, ?steps, "dry run complete");
        }
        Err(e) if e.is_clean_abort() => {
            error!(error = %e, "auto-renew skipped, nothing was changed");
        }
        Err(e) => {
            error!(error = %e, target = ?e.target(), "auto-renew failed");
            // Flush the file writer before exiting.
            drop(_guard);
            std::process::exit(1);
        }
    }

    Ok(())
}
