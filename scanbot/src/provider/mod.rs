use crate::error::{DispatchError, ProviderError};
use async_trait::async_trait;
use derive_more::Display;
use scanbot_ta::{CandleSeries, Interval};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::info;

/// [`MarketDataProvider`] replaying kline JSON files from disk.
pub mod file;

/// Source of candle data for a single market and interval.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch up to `limit` of the most recent candles for `symbol` on `interval`, oldest-first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, ProviderError>;
}

/// Source of the ordered set of symbols scanned each scheduled cycle, eg/ top-N by market cap.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    async fn list_universe(&self) -> Result<Vec<SmolStr>, ProviderError>;
}

/// Where a rendered message is delivered.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum Destination {
    /// Broadcast channel receiving scheduled scan results.
    #[display("broadcast")]
    Broadcast,
    /// Requester-specific reply address for on-demand results.
    #[display("reply:{_0}")]
    Reply(SmolStr),
}

/// Delivers rendered alert texts.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, text: &str, destination: &Destination) -> Result<(), DispatchError>;
}

/// Fixed [`UniverseProvider`], typically sourced from configuration.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct StaticUniverse {
    symbols: Vec<SmolStr>,
}

impl StaticUniverse {
    pub fn new<Iter, S>(symbols: Iter) -> Self
    where
        Iter: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl UniverseProvider for StaticUniverse {
    async fn list_universe(&self) -> Result<Vec<SmolStr>, ProviderError> {
        Ok(self.symbols.clone())
    }
}

/// [`Dispatcher`] that emits every message as an `INFO` log line.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn send(&self, text: &str, destination: &Destination) -> Result<(), DispatchError> {
        info!(%destination, "{text}");
        Ok(())
    }
}
