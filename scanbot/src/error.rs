use crate::{provider::Destination, scan::PairKey};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a market data or universe provider.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
pub enum ProviderError {
    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("market not found")]
    NotFound,

    #[error("transient provider failure: {0}")]
    Transient(String),
}

/// Failure reported by a [`Dispatcher`](crate::provider::Dispatcher).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("dispatch channel failure: {0}")]
pub struct DispatchError(pub String);

/// Failures encountered while running a scan cycle or an on-demand analysis.
///
/// None of these are fatal: each degrades to "no signal for this pair" or "retry later".
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ScanError {
    #[error("data unavailable for {pair}: {reason}")]
    DataUnavailable { pair: PairKey, reason: ProviderError },

    #[error("provider rate limited while fetching {0}")]
    ProviderRateLimited(PairKey),

    #[error("fetch for {pair} timed out after {timeout:?}")]
    FetchTimeout { pair: PairKey, timeout: Duration },

    #[error("scan universe unavailable: {0}")]
    UniverseUnavailable(ProviderError),

    #[error("failed to dispatch to {destination}: {error}")]
    DispatchFailure {
        destination: Destination,
        error: DispatchError,
    },
}

impl ScanError {
    /// Map a [`ProviderError`] encountered fetching `pair` into a [`ScanError`].
    pub fn from_provider(pair: PairKey, error: ProviderError) -> Self {
        match error {
            ProviderError::RateLimited => Self::ProviderRateLimited(pair),
            reason => Self::DataUnavailable { pair, reason },
        }
    }

    /// Determine if the failed operation is worth attempting again on a later cycle.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::DataUnavailable {
                reason: ProviderError::NotFound,
                ..
            } => false,
            _ => true,
        }
    }
}

/// Failures loading a [`ScannerConfig`](crate::config::ScannerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
