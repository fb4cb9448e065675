use crate::{error::ConfigError, signal::composer::SignalPolicy};
use scanbot_ta::{IndicatorConfig, Interval, PatternConfig};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{fs, path::Path, path::PathBuf, time::Duration};

/// Top-level `Scanbot` configuration.
///
/// Every section and field is optional in the JSON representation and falls back to its
/// default.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Indicator windows and RSI smoothing.
    pub indicators: IndicatorConfig,

    /// Candle pattern thresholds.
    pub patterns: PatternConfig,

    /// Rules deciding when indicator state is newsworthy enough to emit a signal.
    pub policy: SignalPolicy,

    /// Scan universe, fetch throttling and scheduling.
    pub scan: ScanConfig,

    /// Emit JSON formatted logs from the `scanbot` binary.
    pub json_logs: bool,
}

impl ScannerConfig {
    /// Load a [`ScannerConfig`] from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a [`ScannerConfig`] from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Token bucket parameters throttling outbound provider fetches.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Fetches permitted per `interval_ms`.
    pub capacity: usize,
    pub interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            interval_ms: 1_000,
        }
    }
}

/// Scan universe, throttling and scheduling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Intervals scanned for every symbol on each scheduled cycle.
    pub intervals: Vec<Interval>,

    /// Intervals on-demand requests may ask for.
    pub allowed_intervals: Vec<Interval>,

    /// Number of most recent candles requested per pair.
    pub candle_limit: usize,

    /// Upper bound on concurrent outbound fetches.
    pub max_concurrent_fetches: usize,

    /// A fetch still pending after this long is cancelled.
    pub fetch_timeout_ms: u64,

    pub rate_limit: RateLimitConfig,

    /// Quote asset each symbol is priced against, eg/ "USDT".
    pub quote_asset: SmolStr,

    /// Period between scheduled scan cycles.
    pub cycle_period_secs: u64,

    /// Static universe used by the `scanbot` binary.
    pub symbols: Vec<SmolStr>,

    /// Directory of kline JSON files used by the `scanbot` binary.
    pub data_dir: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            intervals: vec![Interval::D1],
            allowed_intervals: Interval::ALL.to_vec(),
            candle_limit: 200,
            max_concurrent_fetches: 8,
            fetch_timeout_ms: 10_000,
            rate_limit: RateLimitConfig::default(),
            quote_asset: SmolStr::new_static("USDT"),
            cycle_period_secs: 24 * 60 * 60,
            symbols: Vec::new(),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ScanConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.cycle_period_secs.max(1))
    }

    /// Interval used by on-demand requests that do not name one.
    pub fn default_interval(&self) -> Interval {
        self.intervals.first().copied().unwrap_or(Interval::D1)
    }

    pub fn is_allowed(&self, interval: Interval) -> bool {
        self.allowed_intervals.contains(&interval)
    }
}
