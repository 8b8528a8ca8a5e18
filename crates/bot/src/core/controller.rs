//! Auto-renew controller.
//!
//! One run reads the market and the exchange's current auto-renew slot,
//! computes a [`TargetConfig`], and either leaves the slot alone or walks the
//! apply pipeline:
//!
//! 1. Disable the current config (only when one is active)
//! 2. Cancel all open lending offers
//! 3. Submit the new config
//! 4. Wait for the settle delay and sum the placed offers
//! 5. Notify the operator
//!
//! Steps 1-3 are fatal and abort with [`RenewError::MutationFailed`]. Nothing
//! is rolled back; the next run recomputes and re-applies. Steps 4-5 only log.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::period_selector::select_period;
use super::range_aggregator;
use super::rank_resolver::RankRateResolver;
use crate::config::validate::renew_violations;
use crate::config::RenewConfig;
use crate::constants::FLOAT_EPSILON;
use crate::errors::RenewError;
use crate::execution::exchange::{FundingExchange, Notifier};
use crate::types::{
    ApplyStep, AutoFundingConfig, AutoFundingRequest, RateDisplay, TargetConfig,
};

// ---------------------------------------------------------------------------
// Run state and outcome
// ---------------------------------------------------------------------------

/// Lifecycle phase of one run. Only used for logging transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Evaluating,
    NoOp,
    Applying,
    Verifying,
    Notified,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Evaluating => "evaluating",
            Self::NoOp => "no_op",
            Self::Applying => "applying",
            Self::Verifying => "verifying",
            Self::Notified => "notified",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// The active config already equals the target.
    Unchanged,
    /// No candle in the window carried volume.
    NoCandles,
}

/// What an applying run did.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    pub target: TargetConfig,
    /// Steps that ran, in order.
    pub steps: Vec<ApplyStep>,
    /// Sum of open offer amounts after the settle delay; `None` when the
    /// read-back failed.
    pub placed_amount: Option<Decimal>,
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    NoOp { reason: NoOpReason },
    Applied(ApplyReport),
    /// Dry-run: the pipeline that would have run.
    DryRun {
        target: TargetConfig,
        steps: Vec<ApplyStep>,
    },
}

// ---------------------------------------------------------------------------
// Apply plan
// ---------------------------------------------------------------------------

/// Ordered list of apply steps for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    steps: Vec<ApplyStep>,
}

impl ApplyPlan {
    /// Full pipeline, without the disable step when nothing is active.
    pub fn for_current(current: Option<&AutoFundingConfig>) -> Self {
        let mut steps = Vec::with_capacity(5);
        if current.is_some() {
            steps.push(ApplyStep::DisableCurrent);
        }
        steps.extend([
            ApplyStep::CancelOffers,
            ApplyStep::SubmitConfig,
            ApplyStep::Verify,
            ApplyStep::Notify,
        ]);
        Self { steps }
    }

    pub fn steps(&self) -> &[ApplyStep] {
        &self.steps
    }
}

/// Whether the active config already matches the target.
///
/// Rate and amount must be within [`FLOAT_EPSILON`]; period must be equal.
/// A missing config never matches.
pub fn is_unchanged(current: Option<&AutoFundingConfig>, target: &TargetConfig) -> bool {
    let Some(current) = current else {
        return false;
    };
    let close = |a: Decimal, b: Decimal| (a - b).abs() < FLOAT_EPSILON;
    close(current.rate, target.rate)
        && close(current.amount, target.amount)
        && current.period == target.period
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct AutoRenewController {
    exchange: Arc<dyn FundingExchange>,
    notifier: Arc<dyn Notifier>,
    config: RenewConfig,
    resolver: RankRateResolver,
    app_name: String,
    dry_run: bool,
}

impl AutoRenewController {
    /// Fails with [`RenewError::Validation`] before any network call when the
    /// renew settings are out of range.
    pub fn new(
        exchange: Arc<dyn FundingExchange>,
        notifier: Arc<dyn Notifier>,
        config: RenewConfig,
        app_name: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self, RenewError> {
        let violations = renew_violations(&config);
        if !violations.is_empty() {
            return Err(RenewError::Validation(violations.join("; ")));
        }

        Ok(Self {
            exchange,
            notifier,
            resolver: RankRateResolver::new(config.rate_min, config.rate_max),
            config,
            app_name: app_name.into(),
            dry_run,
        })
    }

    /// Execute one evaluate-and-apply cycle.
    pub async fn run(&self) -> Result<RunOutcome, RenewError> {
        let result = self.run_inner().await;
        if let Err(e) = &result {
            error!(phase = %RunPhase::Failed, error = %e, "auto-renew run failed");
        }
        result
    }

    async fn run_inner(&self) -> Result<RunOutcome, RenewError> {
        let cfg = &self.config;
        info!(
            phase = %RunPhase::Evaluating,
            currency = %cfg.currency,
            amount = %cfg.amount,
            rank = %cfg.rank,
            rate_min = %RateDisplay(cfg.rate_min),
            rate_max = %RateDisplay(cfg.rate_max),
            periods = cfg.period.len(),
            dry_run = self.dry_run,
            "evaluating auto-renew"
        );

        // 1. Platform must be up
        if !self.exchange.platform_operative().await? {
            return Err(RenewError::UpstreamUnavailable {
                reason: "Bitfinex API is in maintenance mode".into(),
            });
        }

        // 2. Reference rate (informational)
        match self.exchange.get_reference_rate(&cfg.currency).await {
            Ok(reference) => info!(
                currency = %cfg.currency,
                timestamp = reference.timestamp,
                rate = %RateDisplay(reference.rate),
                "reference rate"
            ),
            Err(e) => warn!(error = %e, "reference rate unavailable"),
        }

        // 3. Current auto-renew slot
        let current = self.exchange.get_auto_funding_status(&cfg.currency).await?;
        match &current {
            Some(c) => info!(
                currency = %c.currency,
                rate = %RateDisplay(c.rate),
                period = c.period,
                amount = %c.amount,
                "current auto-renew"
            ),
            None => info!(currency = %cfg.currency, "auto-renew is off"),
        }

        // 4. Market window → target
        let candles = self.exchange.get_candles(&cfg.candle_query()).await?;
        let window_ms = i64::try_from(cfg.window_seconds.saturating_mul(1_000)).unwrap_or(i64::MAX);
        let cutoff_ms = chrono::Utc::now().timestamp_millis().saturating_sub(window_ms);

        let Some(ranges) = range_aggregator::aggregate(&candles, cutoff_ms) else {
            info!(
                phase = %RunPhase::NoOp,
                candles = candles.len(),
                "auto-renew unchanged: no candles in window"
            );
            return Ok(RunOutcome::NoOp {
                reason: NoOpReason::NoCandles,
            });
        };

        let rate = self.resolver.resolve(&ranges, cfg.rank)?;
        let target = TargetConfig {
            rate,
            period: select_period(&cfg.period, rate),
            amount: cfg.amount,
        };
        info!(
            rate = %RateDisplay(target.rate),
            period = target.period,
            amount = %target.amount,
            ranges = ranges.len(),
            "target computed"
        );

        // 5. Decision
        if is_unchanged(current.as_ref(), &target) {
            info!(phase = %RunPhase::NoOp, "auto-renew unchanged");
            return Ok(RunOutcome::NoOp {
                reason: NoOpReason::Unchanged,
            });
        }

        let plan = ApplyPlan::for_current(current.as_ref());
        if self.dry_run {
            info!(
                target = %target,
                steps = ?plan.steps(),
                "DRY RUN: auto-renew would be applied"
            );
            return Ok(RunOutcome::DryRun {
                target,
                steps: plan.steps().to_vec(),
            });
        }

        self.apply(&plan, target).await.map(RunOutcome::Applied)
    }

    // -----------------------------------------------------------------------
    // Apply pipeline
    // -----------------------------------------------------------------------

    async fn apply(&self, plan: &ApplyPlan, target: TargetConfig) -> Result<ApplyReport, RenewError> {
        let currency = self.config.currency.as_str();
        let mut report = ApplyReport {
            target,
            steps: Vec::with_capacity(plan.steps().len()),
            placed_amount: None,
            notified: false,
        };

        for &step in plan.steps() {
            match step {
                ApplyStep::DisableCurrent => {
                    info!(phase = %RunPhase::Applying, %step);
                    self.exchange
                        .set_auto_funding(&AutoFundingRequest::disable(currency))
                        .await
                        .map_err(|e| mutation_failed(step, &report.target, e))?;
                }
                ApplyStep::CancelOffers => {
                    info!(phase = %RunPhase::Applying, %step);
                    self.exchange
                        .cancel_all_offers(currency)
                        .await
                        .map_err(|e| mutation_failed(step, &report.target, e))?;
                }
                ApplyStep::SubmitConfig => {
                    info!(phase = %RunPhase::Applying, %step, target = %report.target);
                    self.exchange
                        .set_auto_funding(&AutoFundingRequest::enable(currency, &report.target))
                        .await
                        .map_err(|e| mutation_failed(step, &report.target, e))?;
                }
                ApplyStep::Verify => {
                    info!(phase = %RunPhase::Verifying, settle_delay_ms = self.config.settle_delay_ms);
                    tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
                    report.placed_amount = self.placed_amount(currency).await;
                }
                ApplyStep::Notify => {
                    let text = self.notification_text(&report);
                    match self.notifier.notify(&text).await {
                        Ok(()) => report.notified = true,
                        Err(e) => error!(error = %e, "failed to notify operator"),
                    }
                    info!(phase = %RunPhase::Notified, delivered = report.notified);
                }
            }
            report.steps.push(step);
        }

        Ok(report)
    }

    async fn placed_amount(&self, currency: &str) -> Option<Decimal> {
        match self.exchange.get_open_offers(currency).await {
            Ok(offers) => {
                let total: Decimal = offers.iter().map(|o| o.amount).sum();
                let total = total.round_dp(8);
                debug!(offers = offers.len(), placed = %total, "open offers after submit");
                Some(total)
            }
            Err(e) => {
                warn!(error = %e, "could not verify placed offers");
                None
            }
        }
    }

    fn notification_text(&self, report: &ApplyReport) -> String {
        let amount = report.placed_amount.unwrap_or(report.target.amount);
        format!(
            "{}:\nAuto-renew lending {} {} at {}, up to {} days",
            self.app_name,
            amount.normalize(),
            self.config.currency,
            RateDisplay(report.target.rate),
            report.target.period
        )
    }
}

fn mutation_failed(step: ApplyStep, target: &TargetConfig, source: RenewError) -> RenewError {
    RenewError::MutationFailed {
        step,
        target: target.clone(),
        source: Box::new(source),
    }
}
