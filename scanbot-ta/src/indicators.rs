use crate::candle::CandleSeries;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Simple moving average indicator.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new SMA with the given period.
    pub fn new(period: usize) -> Self {
        Self {
            period,
            values: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    /// Update the SMA with a new value and return the average once `period` values are held.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.average()
    }

    /// Current average value, if the window is full.
    pub fn average(&self) -> Option<f64> {
        (self.period > 0 && self.values.len() == self.period)
            .then(|| self.sum / self.period as f64)
    }
}

/// Exponential moving average indicator.
///
/// Seeded with the first observed value, then `ema = (price - ema) * α + ema` with
/// `α = 2 / (span + 1)`.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    multiplier: f64,
    value: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create a new EMA with the given span.
    pub fn new(span: usize) -> Self {
        Self::with_multiplier(2.0 / (span as f64 + 1.0))
    }

    /// Create a new EMA with an explicit smoothing factor.
    pub fn with_multiplier(multiplier: f64) -> Self {
        Self {
            multiplier,
            value: None,
        }
    }

    /// Update the EMA with a new price and return the latest value.
    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            Some(value) => (price - value) * self.multiplier + value,
            None => price,
        };
        self.value = Some(next);
        next
    }

    /// Current EMA value if initialised.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Smoothing applied to average gains and losses by [`rsi`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSmoothing {
    /// Seeded with the simple mean of the first `period` deltas, then `α = 1 / period`.
    #[default]
    Wilder,
    /// Exponential weighting with `α = 2 / (period + 1)`, seeded with the first delta.
    Exponential,
}

/// Relative Strength Index computed from a stream of closes.
#[derive(Debug, Clone)]
pub struct RelativeStrengthIndex {
    period: usize,
    smoothing: RsiSmoothing,
    prev_close: Option<f64>,
    deltas: usize,
    avg_gain: f64,
    avg_loss: f64,
    gain_ema: ExponentialMovingAverage,
    loss_ema: ExponentialMovingAverage,
}

impl RelativeStrengthIndex {
    pub fn new(period: usize, smoothing: RsiSmoothing) -> Self {
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self {
            period,
            smoothing,
            prev_close: None,
            deltas: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            gain_ema: ExponentialMovingAverage::with_multiplier(multiplier),
            loss_ema: ExponentialMovingAverage::with_multiplier(multiplier),
        }
    }

    /// Update with the next close, returning the RSI once `period` deltas have been observed.
    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        if self.period == 0 {
            return None;
        }

        let delta = close - prev;
        let (gain, loss) = (delta.max(0.0), (-delta).max(0.0));
        self.deltas += 1;

        match self.smoothing {
            RsiSmoothing::Wilder => {
                let period = self.period as f64;
                if self.deltas <= self.period {
                    self.avg_gain += gain / period;
                    self.avg_loss += loss / period;
                } else {
                    self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
                    self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
                }
            }
            RsiSmoothing::Exponential => {
                self.avg_gain = self.gain_ema.update(gain);
                self.avg_loss = self.loss_ema.update(loss);
            }
        }

        (self.deltas >= self.period).then(|| rsi_from_averages(self.avg_gain, self.avg_loss))
    }
}

/// `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`, defined as 100 when `avg_loss` is zero.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Full-history exponential moving average of `data` with the given span.
///
/// Seeded with the first value, so every index is defined and any two averages over the same
/// data can be compared from the first bar onward. A zero span yields no values.
pub fn ema(data: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; data.len()];
    }
    let mut ema = ExponentialMovingAverage::new(span);
    data.iter().map(|&value| Some(ema.update(value))).collect()
}

/// Relative Strength Index of `data`. Values before index `period` are `None`.
pub fn rsi(data: &[f64], period: usize, smoothing: RsiSmoothing) -> Vec<Option<f64>> {
    let mut rsi = RelativeStrengthIndex::new(period, smoothing);
    data.iter().map(|&close| rsi.update(close)).collect()
}

/// Simple moving average of `data`. Values before index `window - 1` are `None`.
pub fn rolling_mean(data: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut sma = SimpleMovingAverage::new(window);
    data.iter().map(|&value| sma.update(value)).collect()
}

/// Arithmetic mean of every value, `None` when empty.
pub fn mean(data: &[f64]) -> Option<f64> {
    (!data.is_empty()).then(|| data.iter().sum::<f64>() / data.len() as f64)
}

/// Indicator windows used to derive an [`IndicatorSet`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_short: usize,
    pub ema_long: usize,
    pub ma_fast: usize,
    pub ma_slow: usize,
    pub rsi_period: usize,
    pub rsi_smoothing: RsiSmoothing,
    pub volume_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_short: 9,
            ema_long: 21,
            ma_fast: 50,
            ma_slow: 200,
            rsi_period: 14,
            rsi_smoothing: RsiSmoothing::Wilder,
            volume_period: 14,
        }
    }
}

impl IndicatorConfig {
    /// Longest window the short-term signal depends on.
    ///
    /// The long-term moving average pair is excluded: full-history averages are defined from
    /// the first bar, so `ma_fast`/`ma_slow` never gate analysis.
    pub fn longest_window(&self) -> usize {
        self.ema_short
            .max(self.ema_long)
            .max(self.rsi_period + 1)
            .max(self.volume_period)
    }
}

/// Indicator sequences derived from one [`CandleSeries`], index-aligned with its bars.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorSet {
    pub ema_short: Vec<Option<f64>>,
    pub ema_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub ma_fast: Vec<Option<f64>>,
    pub ma_slow: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
}

impl IndicatorSet {
    /// Compute every indicator for the provided [`CandleSeries`].
    pub fn compute(series: &CandleSeries, config: &IndicatorConfig) -> Self {
        let closes = series.closes();
        let volumes = series.volumes();

        Self {
            ema_short: ema(&closes, config.ema_short),
            ema_long: ema(&closes, config.ema_long),
            rsi: rsi(&closes, config.rsi_period, config.rsi_smoothing),
            ma_fast: ema(&closes, config.ma_fast),
            ma_slow: ema(&closes, config.ma_slow),
            volume_avg: rolling_mean(&volumes, config.volume_period),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }
}

/// Latest defined value of an indicator sequence.
pub fn last_value(values: &[Option<f64>]) -> Option<f64> {
    values.last().copied().flatten()
}
