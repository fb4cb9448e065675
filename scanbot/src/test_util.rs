use crate::{
    clock::ScanClock,
    error::{DispatchError, ProviderError},
    provider::{Destination, Dispatcher, MarketDataProvider, UniverseProvider},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use scanbot_ta::{Bar, CandleSeries, Interval};
use smol_str::SmolStr;
use std::{sync::Arc, time::Duration};

/// 2024-01-01T00:00:00Z, the timestamp of the first bar produced by the builders below.
const BASE_TIMESTAMP_SECS: i64 = 1_704_067_200;

/// Timestamp of the bar at `index`, one day apart.
pub fn timestamp(index: usize) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_TIMESTAMP_SECS + index as i64 * 86_400, 0).unwrap_or_default()
}

pub fn bar(index: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
    Bar {
        timestamp: timestamp(index),
        open,
        high,
        low,
        close,
        volume,
    }
}

pub fn series(symbol: &str, interval: Interval, bars: Vec<Bar>) -> CandleSeries {
    CandleSeries::new(symbol, interval, bars)
}

/// Bars opening at the previous close and closing at each of `closes`, with shadows spanning
/// both.
pub fn series_from_closes(symbol: &str, interval: Interval, closes: &[f64]) -> CandleSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(index, &close)| {
            let open = index
                .checked_sub(1)
                .and_then(|prev| closes.get(prev))
                .copied()
                .unwrap_or(close);
            bar(index, open, open.max(close), open.min(close), close, 10.0)
        })
        .collect();

    series(symbol, interval, bars)
}

/// `len` bars with open, high, low and close all equal to `price`.
pub fn flat_bars(len: usize, price: f64) -> Vec<Bar> {
    (0..len)
        .map(|index| bar(index, price, price, price, price, 10.0))
        .collect()
}

/// `len` identical bullish bars without shadows.
pub fn marubozu_bars(len: usize) -> Vec<Bar> {
    (0..len)
        .map(|index| bar(index, 10.0, 12.0, 10.0, 12.0, 10.0))
        .collect()
}

/// `len` shadowless bars alternating bullish and bearish on a gentle uptrend, which fires no
/// candle pattern and keeps the RSI neutral.
pub fn zigzag_bars(len: usize) -> Vec<Bar> {
    (0..len)
        .map(|index| {
            let base = 10.0 + 0.1 * index as f64;
            let (open, close) = if index % 2 == 0 {
                (base, base + 2.0)
            } else {
                (base + 2.0, base)
            };
            bar(index, open, open.max(close), open.min(close), close, 10.0)
        })
        .collect()
}

#[derive(Debug, Default)]
struct MockProviderState {
    bars: FnvHashMap<SmolStr, Vec<Bar>>,
    errors: FnvHashMap<SmolStr, ProviderError>,
    delays: FnvHashMap<SmolStr, Duration>,
    calls: Vec<(SmolStr, Interval, usize)>,
}

/// Scripted [`MarketDataProvider`].
///
/// Serves the same bars for every interval of a symbol. Symbols with neither bars nor an
/// error configured yield [`ProviderError::NotFound`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockProviderState>>,
}

impl MockProvider {
    pub fn with_bars(self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.set_bars(symbol, bars);
        self
    }

    pub fn with_error(self, symbol: &str, error: ProviderError) -> Self {
        self.state.lock().errors.insert(SmolStr::new(symbol), error);
        self
    }

    /// Delay every fetch of `symbol` by `delay` before responding.
    pub fn with_delay(self, symbol: &str, delay: Duration) -> Self {
        self.state.lock().delays.insert(SmolStr::new(symbol), delay);
        self
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        let mut state = self.state.lock();
        state.errors.remove(symbol);
        state.bars.insert(SmolStr::new(symbol), bars);
    }

    /// Every `(symbol, interval, limit)` fetch received, in arrival order.
    pub fn calls(&self) -> Vec<(SmolStr, Interval, usize)> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries, ProviderError> {
        let (delay, response) = {
            let mut state = self.state.lock();
            state.calls.push((SmolStr::new(symbol), interval, limit));

            let response = match (state.errors.get(symbol), state.bars.get(symbol)) {
                (Some(error), _) => Err(error.clone()),
                (None, Some(bars)) => Ok(bars.clone()),
                (None, None) => Err(ProviderError::NotFound),
            };

            (state.delays.get(symbol).copied(), response)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        response.map(|bars| CandleSeries::new(symbol, interval, bars).retain_latest(limit))
    }
}

/// Scripted [`UniverseProvider`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MockUniverse {
    symbols: Arc<Mutex<Result<Vec<SmolStr>, ProviderError>>>,
}

impl Default for MockUniverse {
    fn default() -> Self {
        Self::new(Vec::<SmolStr>::new())
    }
}

impl MockUniverse {
    pub fn new<Iter, S>(symbols: Iter) -> Self
    where
        Iter: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            symbols: Arc::new(Mutex::new(Ok(symbols.into_iter().map(Into::into).collect()))),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            symbols: Arc::new(Mutex::new(Err(error))),
        }
    }

    pub fn set_symbols<Iter, S>(&self, symbols: Iter)
    where
        Iter: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        *self.symbols.lock() = Ok(symbols.into_iter().map(Into::into).collect());
    }
}

#[async_trait]
impl UniverseProvider for MockUniverse {
    async fn list_universe(&self) -> Result<Vec<SmolStr>, ProviderError> {
        self.symbols.lock().clone()
    }
}

#[derive(Debug, Default)]
struct RecordingDispatcherState {
    messages: Vec<(String, Destination)>,
    failing: bool,
}

/// [`Dispatcher`] capturing every delivered message. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    state: Arc<Mutex<RecordingDispatcherState>>,
}

impl RecordingDispatcher {
    /// Construct a [`RecordingDispatcher`] that rejects every message until
    /// [`set_failing(false)`](Self::set_failing).
    pub fn failing() -> Self {
        let dispatcher = Self::default();
        dispatcher.set_failing(true);
        dispatcher
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Successfully delivered `(text, destination)` messages, in delivery order.
    pub fn messages(&self) -> Vec<(String, Destination)> {
        self.state.lock().messages.clone()
    }

    /// Texts delivered to `destination`, in delivery order.
    pub fn texts_to(&self, destination: &Destination) -> Vec<String> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|(_, sent_to)| sent_to == destination)
            .map(|(text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn send(&self, text: &str, destination: &Destination) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(DispatchError(format!("{destination} unavailable")));
        }
        state.messages.push((text.to_string(), destination.clone()));
        Ok(())
    }
}

/// Settable [`ScanClock`]. Clones share state.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.lock() = time;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut time = self.time.lock();
        *time += delta;
    }
}

impl ScanClock for ManualClock {
    fn time(&self) -> DateTime<Utc> {
        *self.time.lock()
    }
}
