use super::{CrossEvent, CrossKind, RsiState, SignalRecord, TrendDirection};
use crate::config::ScannerConfig;
use scanbot_ta::{
    CandleSeries, Cross, IndicatorConfig, IndicatorSet, PatternConfig,
    crossover::latest_crossover,
    indicators::{last_value, mean},
    patterns::{MAX_LOOKBACK, recognize},
};
use serde::{Deserialize, Serialize};

/// Baseline the latest bar's volume is compared against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBaseline {
    /// Mean volume over the whole series window.
    #[default]
    FullWindow,
    /// Rolling mean over `volume_period` bars.
    Rolling,
}

/// Rules deciding when indicator state is newsworthy.
///
/// Trend direction is always reported but never triggers a signal on its own. A signal is
/// emitted when the RSI is outside its neutral band, volume is above its baseline, any candle
/// pattern fires, or (when `cross_alone_triggers` is set) any crossover fires.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalPolicy {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_baseline: VolumeBaseline,
    pub cross_alone_triggers: bool,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_baseline: VolumeBaseline::FullWindow,
            cross_alone_triggers: true,
        }
    }
}

impl SignalPolicy {
    pub fn rsi_state(&self, rsi: f64) -> RsiState {
        if rsi < self.rsi_oversold {
            RsiState::Oversold
        } else if rsi > self.rsi_overbought {
            RsiState::Overbought
        } else {
            RsiState::Neutral
        }
    }
}

/// Outcome of analysing a single [`CandleSeries`].
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// Series is shorter than the warm-up requirement.
    InsufficientHistory { bars: usize, required: usize },
    NoSignal,
    Signal(SignalRecord),
}

/// Combines indicator state, candle patterns and crossovers into an optional [`SignalRecord`].
///
/// Stateless: composing the same input twice yields identical output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalComposer {
    indicators: IndicatorConfig,
    patterns: PatternConfig,
    policy: SignalPolicy,
}

impl SignalComposer {
    pub fn new(indicators: IndicatorConfig, patterns: PatternConfig, policy: SignalPolicy) -> Self {
        Self {
            indicators,
            patterns,
            policy,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.indicators, config.patterns, config.policy)
    }

    /// Minimum number of bars required before a series is analysed.
    pub fn required_bars(&self) -> usize {
        self.indicators.longest_window().max(MAX_LOOKBACK) + 1
    }

    /// Compute the [`IndicatorSet`] for `series` and compose it into an [`Analysis`].
    pub fn analyse(&self, series: &CandleSeries) -> Analysis {
        let required = self.required_bars();
        if series.len() < required {
            return Analysis::InsufficientHistory {
                bars: series.len(),
                required,
            };
        }

        let indicators = IndicatorSet::compute(series, &self.indicators);
        match self.compose(series, &indicators) {
            Some(record) => Analysis::Signal(record),
            None => Analysis::NoSignal,
        }
    }

    /// Compose a [`SignalRecord`] from `series` and its pre-computed `indicators`.
    ///
    /// Returns `None` for insufficient or misaligned input, or when nothing newsworthy fired.
    pub fn compose(
        &self,
        series: &CandleSeries,
        indicators: &IndicatorSet,
    ) -> Option<SignalRecord> {
        if series.len() < self.required_bars() || indicators.len() != series.len() {
            return None;
        }

        let last = series.last()?;
        let bar_index = series.last_index()?;

        let ema_short = last_value(&indicators.ema_short)?;
        let ema_long = last_value(&indicators.ema_long)?;
        let trend_direction = if ema_short > ema_long {
            TrendDirection::Long
        } else {
            TrendDirection::Short
        };

        let rsi = last_value(&indicators.rsi);
        let rsi_state = rsi
            .map(|rsi| self.policy.rsi_state(rsi))
            .unwrap_or(RsiState::Neutral);

        let volume_baseline = match self.policy.volume_baseline {
            VolumeBaseline::FullWindow => mean(&series.volumes()),
            VolumeBaseline::Rolling => last_value(&indicators.volume_avg),
        };
        let volume_above_average = volume_baseline.is_some_and(|baseline| last.volume > baseline);

        let crosses = crosses(indicators, bar_index);
        let patterns = recognize(series, &self.patterns);

        let triggered = rsi_state != RsiState::Neutral
            || volume_above_average
            || !patterns.is_empty()
            || (self.policy.cross_alone_triggers && !crosses.is_empty());

        triggered.then(|| SignalRecord {
            symbol: series.symbol().clone(),
            interval: series.interval(),
            trend_direction,
            rsi_state,
            rsi,
            close: last.close,
            volume_above_average,
            patterns,
            crosses,
            malformed_bars: series.quality().malformed_bars(),
            generated_at: last.timestamp,
        })
    }
}

/// Detect crossovers on the latest bar for both the short-term EMA pair and the long-term
/// moving-average pair.
fn crosses(indicators: &IndicatorSet, bar_index: usize) -> Vec<CrossEvent> {
    let short_term = latest_crossover(&indicators.ema_short, &indicators.ema_long).map(|cross| {
        match cross {
            Cross::Above => CrossKind::BullishEmaCross,
            Cross::Below => CrossKind::BearishEmaCross,
        }
    });

    let long_term = latest_crossover(&indicators.ma_fast, &indicators.ma_slow).map(|cross| {
        match cross {
            Cross::Above => CrossKind::GoldenCross,
            Cross::Below => CrossKind::DeathCross,
        }
    });

    let mut crosses = [long_term, short_term]
        .into_iter()
        .flatten()
        .map(|kind| CrossEvent { kind, bar_index })
        .collect::<Vec<_>>();
    crosses.sort();
    crosses
}
