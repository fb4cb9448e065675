use chrono::{DateTime, Utc};
use derive_more::Display;
use itertools::Itertools;
use scanbot_ta::{Interval, PatternTag};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// [`SignalComposer`](composer::SignalComposer) turning indicator state into [`SignalRecord`]s.
pub mod composer;

/// Direction of the short-term trend on the latest bar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum TrendDirection {
    #[display("LONG")]
    Long,
    #[display("SHORT")]
    Short,
}

/// Momentum state derived from the latest RSI value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum RsiState {
    #[display("overbought")]
    Overbought,
    #[display("oversold")]
    Oversold,
    #[display("neutral")]
    Neutral,
}

/// Kind of moving-average crossover.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum CrossKind {
    /// Fast long-term average crossed above the slow long-term average.
    GoldenCross,
    /// Fast long-term average crossed below the slow long-term average.
    DeathCross,
    /// Short EMA crossed above the long EMA.
    BullishEmaCross,
    /// Short EMA crossed below the long EMA.
    BearishEmaCross,
}

/// A [`CrossKind`] detected on a specific bar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct CrossEvent {
    pub kind: CrossKind,
    pub bar_index: usize,
}

/// Everything noteworthy about one market on one interval at the end of a scan.
///
/// Lives for the duration of a scan cycle and any immediate dispatch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignalRecord {
    pub symbol: SmolStr,
    pub interval: Interval,
    pub trend_direction: TrendDirection,
    pub rsi_state: RsiState,
    pub rsi: Option<f64>,
    pub close: f64,
    pub volume_above_average: bool,
    pub patterns: Vec<PatternTag>,
    pub crosses: Vec<CrossEvent>,
    /// Number of bars in the analysed series that carried malformed fields.
    pub malformed_bars: usize,
    /// Timestamp of the latest bar the record was generated from.
    pub generated_at: DateTime<Utc>,
}

impl SignalRecord {
    /// Render a single human-readable alert line, eg/
    /// `LONG - BTC/USDT [1d] | RSI 72.4 overbought | volume above average | Hammer`.
    pub fn render(&self, quote_asset: &str) -> String {
        let mut parts = vec![format!(
            "{} - {} [{}]",
            self.trend_direction,
            market_name(&self.symbol, quote_asset),
            self.interval
        )];

        match self.rsi {
            Some(rsi) => parts.push(format!("RSI {rsi:.1} {}", self.rsi_state)),
            None => parts.push(format!("RSI {}", self.rsi_state)),
        }

        if self.volume_above_average {
            parts.push("volume above average".to_string());
        }

        if !self.patterns.is_empty() {
            parts.push(self.patterns.iter().map(|tag| tag.kind).join(", "));
        }

        if !self.crosses.is_empty() {
            parts.push(self.crosses.iter().map(|cross| cross.kind).join(", "));
        }

        parts.join(" | ")
    }
}

/// Display name of a market, eg/ "BTC/USDT".
pub fn market_name(symbol: &str, quote_asset: &str) -> String {
    if quote_asset.is_empty() {
        symbol.to_string()
    } else {
        format!("{symbol}/{quote_asset}")
    }
}
