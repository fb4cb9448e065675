use super::MarketDataProvider;
use crate::error::ProviderError;
use async_trait::async_trait;
use scanbot_ta::{
    CandleSeries, Interval,
    candle::{RawBar, RawField},
};
use std::{io::ErrorKind, path::PathBuf};
use tracing::debug;

/// Replays exchange kline rows stored as `<dir>/<SYMBOL>_<interval>.json`.
///
/// Each file holds a JSON array of rows `[open_time_ms, open, high, low, close, volume, ..]`,
/// oldest-first, with prices either as numbers or numeric strings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JsonFileMarketData {
    dir: PathBuf,
}

impl JsonFileMarketData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.dir.join(format!("{symbol}_{interval}.json"))
    }
}

#[async_trait]
impl MarketDataProvider for JsonFileMarketData {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, ProviderError> {
        let path = self.path(symbol, interval);
        debug!(path = %path.display(), "reading klines");

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|error| match error.kind() {
                ErrorKind::NotFound => ProviderError::NotFound,
                _ => ProviderError::Transient(error.to_string()),
            })?;

        let rows = serde_json::from_str::<Vec<Vec<RawField>>>(&contents)
            .map_err(|error| ProviderError::Transient(error.to_string()))?;

        let series = CandleSeries::from_raw(
            symbol,
            interval,
            rows.iter().map(|row| RawBar::from_row(row)),
        );

        Ok(series.retain_latest(limit))
    }
}
