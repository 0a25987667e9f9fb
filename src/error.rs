// =============================================================================
// Error taxonomy
// =============================================================================
//
// `ScreenError` covers the scoring core. Per-stock variants exclude one stock
// from a batch; `WeightsUnavailable` is the only batch-fatal one. Upstream
// provider failures are classified separately so the real-time path can tell
// retryable from terminal ones.

use thiserror::Error;

use crate::types::StockId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScreenError {
    #[error("insufficient history for {stock_id}: need {required} bars, have {available}")]
    InsufficientData {
        stock_id: StockId,
        required: usize,
        available: usize,
    },

    #[error("malformed upstream data for {stock_id}: {reason}")]
    UpstreamData { stock_id: StockId, reason: String },

    #[error("price provider failed for {stock_id}: {source}")]
    Provider {
        stock_id: StockId,
        #[source]
        source: ProviderError,
    },

    #[error("weight vector unavailable: {0}")]
    WeightsUnavailable(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScreenError {
    /// Short machine-readable label used in batch failure lists.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::UpstreamData { .. } => "upstream_data",
            Self::Provider { .. } => "provider",
            Self::WeightsUnavailable(_) => "weights_unavailable",
            Self::Persistence(_) => "persistence",
            Self::Config(_) => "config",
        }
    }
}

/// Failure reported by a price provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("transient network error: {0}")]
    Transient(String),

    #[error("request timed out")]
    Timeout,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout)
    }
}
