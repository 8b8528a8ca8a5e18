use thiserror::Error;

use crate::types::{ApplyStep, TargetConfig};

/// Typed error hierarchy for the auto-renew bot.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation.
#[derive(Error, Debug)]
pub enum RenewError {
    // -- Configuration ------------------------------------------------------
    #[error("validation error: {0}")]
    Validation(String),

    // -- Upstream -----------------------------------------------------------
    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("exchange request {endpoint} failed: {reason}")]
    Exchange { endpoint: String, reason: String },

    // -- Apply pipeline -----------------------------------------------------
    #[error("{step} failed: {source} (target: {target})")]
    MutationFailed {
        step: ApplyStep,
        target: TargetConfig,
        #[source]
        source: Box<RenewError>,
    },

    // -- Notification -------------------------------------------------------
    #[error("notification failed: {reason}")]
    NotificationFailed { reason: String },

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RenewError {
    /// Build an [`RenewError::Exchange`] for the given endpoint.
    pub fn exchange(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Exchange {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Whether the run stopped without attempting any change, so the process
    /// can exit cleanly (platform maintenance, unusable upstream data).
    pub fn is_clean_abort(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    /// The target that was being applied, when the error came out of the
    /// apply pipeline.
    pub fn target(&self) -> Option<&TargetConfig> {
        match self {
            Self::MutationFailed { target, .. } => Some(target),
            _ => None,
        }
    }
}
