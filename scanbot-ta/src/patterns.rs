//! Candle shape recognisers.
//!
//! Every [`PatternKind`] is an independent predicate over the latest bars of a
//! [`CandleSeries`]. Predicates never panic on short series: any pattern that needs more bars
//! than are available simply does not fire.

use crate::candle::{Bar, CandleSeries};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Bars inspected by the longest pattern lookback (head & shoulders).
pub const MAX_LOOKBACK: usize = 5;

/// Threshold deciding when the middle bar of a star pattern counts as indecision.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StarIndecision {
    /// Body strictly below this many price units.
    Absolute(f64),
    /// Body strictly below this fraction of the bar's own range.
    RangeFraction(f64),
}

impl StarIndecision {
    pub fn is_indecisive(&self, bar: &Bar) -> bool {
        match *self {
            StarIndecision::Absolute(epsilon) => bar.body() < epsilon,
            StarIndecision::RangeFraction(fraction) => bar.body() < fraction * bar.range(),
        }
    }
}

impl Default for StarIndecision {
    fn default() -> Self {
        Self::Absolute(0.1)
    }
}

/// Thresholds used by the pattern predicates.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Doji when `body <= doji_body_ratio * range`.
    pub doji_body_ratio: f64,
    /// Hammer family when the relevant shadow exceeds `shadow_body_multiple * body`.
    pub shadow_body_multiple: f64,
    /// Black swan range when `range > black_swan_range_multiple * body`.
    pub black_swan_range_multiple: f64,
    pub star_indecision: StarIndecision,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            doji_body_ratio: 0.1,
            shadow_body_multiple: 2.0,
            black_swan_range_multiple: 2.0,
            star_indecision: StarIndecision::default(),
        }
    }
}

/// Fixed catalogue of recognised candle patterns.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
pub enum PatternKind {
    Hammer,
    InvertedHammer,
    Doji,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    BlackSwanRange,
}

impl PatternKind {
    pub const ALL: [PatternKind; 10] = [
        PatternKind::Hammer,
        PatternKind::InvertedHammer,
        PatternKind::Doji,
        PatternKind::BullishEngulfing,
        PatternKind::BearishEngulfing,
        PatternKind::MorningStar,
        PatternKind::EveningStar,
        PatternKind::HeadAndShoulders,
        PatternKind::InverseHeadAndShoulders,
        PatternKind::BlackSwanRange,
    ];

    /// Number of bars the pattern inspects, ending at the latest bar.
    pub fn lookback(&self) -> usize {
        match self {
            PatternKind::Hammer
            | PatternKind::InvertedHammer
            | PatternKind::Doji
            | PatternKind::BlackSwanRange => 1,
            PatternKind::BullishEngulfing | PatternKind::BearishEngulfing => 2,
            PatternKind::MorningStar | PatternKind::EveningStar => 3,
            PatternKind::HeadAndShoulders | PatternKind::InverseHeadAndShoulders => MAX_LOOKBACK,
        }
    }

    /// Evaluate this pattern on the latest bar of `series`.
    pub fn detect(&self, series: &CandleSeries, config: &PatternConfig) -> bool {
        let Some(bars) = latest(series, self.lookback()) else {
            return false;
        };

        match self {
            PatternKind::Hammer => hammer(&bars[0], config),
            PatternKind::InvertedHammer => inverted_hammer(&bars[0], config),
            PatternKind::Doji => doji(&bars[0], config),
            PatternKind::BlackSwanRange => black_swan_range(&bars[0], config),
            PatternKind::BullishEngulfing => bullish_engulfing(&bars[0], &bars[1]),
            PatternKind::BearishEngulfing => bearish_engulfing(&bars[0], &bars[1]),
            PatternKind::MorningStar => morning_star(&bars[0], &bars[1], &bars[2], config),
            PatternKind::EveningStar => evening_star(&bars[0], &bars[1], &bars[2], config),
            PatternKind::HeadAndShoulders => head_and_shoulders(bars),
            PatternKind::InverseHeadAndShoulders => inverse_head_and_shoulders(bars),
        }
    }
}

/// A [`PatternKind`] that fired, along with the index of the bar it applies to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct PatternTag {
    pub kind: PatternKind,
    pub bar_index: usize,
}

/// Run every predicate in `kinds` against the latest bar of `series`, returning the tags that
/// fired in catalogue order.
pub fn recognize_with<Iter>(
    series: &CandleSeries,
    config: &PatternConfig,
    kinds: Iter,
) -> Vec<PatternTag>
where
    Iter: IntoIterator<Item = PatternKind>,
{
    let Some(bar_index) = series.last_index() else {
        return Vec::new();
    };

    let mut tags = kinds
        .into_iter()
        .filter(|kind| kind.detect(series, config))
        .map(|kind| PatternTag { kind, bar_index })
        .collect::<Vec<_>>();

    tags.sort();
    tags.dedup();
    tags
}

/// Run the full [`PatternKind`] catalogue against the latest bar of `series`.
pub fn recognize(series: &CandleSeries, config: &PatternConfig) -> Vec<PatternTag> {
    recognize_with(series, config, PatternKind::ALL)
}

fn latest(series: &CandleSeries, lookback: usize) -> Option<&[Bar]> {
    let bars = series.bars();
    let start = bars.len().checked_sub(lookback)?;
    (lookback > 0).then(|| &bars[start..])
}

fn hammer(bar: &Bar, config: &PatternConfig) -> bool {
    bar.is_bullish() && bar.lower_shadow() > config.shadow_body_multiple * bar.body()
}

fn inverted_hammer(bar: &Bar, config: &PatternConfig) -> bool {
    bar.is_bearish() && bar.upper_shadow() > config.shadow_body_multiple * bar.body()
}

fn doji(bar: &Bar, config: &PatternConfig) -> bool {
    bar.body() <= config.doji_body_ratio * bar.range()
}

fn black_swan_range(bar: &Bar, config: &PatternConfig) -> bool {
    bar.range() > config.black_swan_range_multiple * bar.body()
}

fn bullish_engulfing(prev: &Bar, last: &Bar) -> bool {
    last.is_bullish() && prev.is_bearish() && last.close > prev.open && last.open < prev.close
}

fn bearish_engulfing(prev: &Bar, last: &Bar) -> bool {
    last.is_bearish() && prev.is_bullish() && last.close < prev.open && last.open > prev.close
}

fn morning_star(first: &Bar, middle: &Bar, last: &Bar, config: &PatternConfig) -> bool {
    last.is_bullish() && config.star_indecision.is_indecisive(middle) && first.is_bearish()
}

fn evening_star(first: &Bar, middle: &Bar, last: &Bar, config: &PatternConfig) -> bool {
    last.is_bearish() && config.star_indecision.is_indecisive(middle) && first.is_bullish()
}

// Peak, trough, head, trough, peak over five closes, with the head above both shoulders.
fn head_and_shoulders(bars: &[Bar]) -> bool {
    let [left, left_trough, head, right_trough, right] = closes(bars);
    left > left_trough
        && left_trough < head
        && head > right_trough
        && right_trough < right
        && head > left
        && head > right
}

fn inverse_head_and_shoulders(bars: &[Bar]) -> bool {
    let [left, left_peak, head, right_peak, right] = closes(bars);
    left < left_peak
        && left_peak > head
        && head < right_peak
        && right_peak > right
        && head < left
        && head < right
}

fn closes(bars: &[Bar]) -> [f64; MAX_LOOKBACK] {
    let mut closes = [0.0; MAX_LOOKBACK];
    closes
        .iter_mut()
        .zip(bars)
        .for_each(|(close, bar)| *close = bar.close);
    closes
}
