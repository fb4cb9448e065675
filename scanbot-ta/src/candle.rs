use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Candle interval supported by the scanner.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
pub enum Interval {
    #[serde(rename = "1m")]
    #[display("1m")]
    M1,
    #[serde(rename = "5m")]
    #[display("5m")]
    M5,
    #[serde(rename = "15m")]
    #[display("15m")]
    M15,
    #[serde(rename = "1h")]
    #[display("1h")]
    H1,
    #[serde(rename = "4h")]
    #[display("4h")]
    H4,
    #[serde(rename = "1d")]
    #[display("1d")]
    D1,
    #[serde(rename = "1w")]
    #[display("1w")]
    W1,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::H1,
        Interval::H4,
        Interval::D1,
        Interval::W1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }
}

/// Returned when parsing an unrecognised [`Interval`] string.
#[derive(Debug, Clone, Eq, PartialEq, Display)]
#[display("unrecognised interval: {_0}")]
pub struct ParseIntervalError(pub String);

impl std::error::Error for ParseIntervalError {}

impl FromStr for Interval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == lower)
            .ok_or_else(|| ParseIntervalError(s.to_string()))
    }
}

/// Normalised OHLCV bar.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Absolute distance between open and close.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Distance between high and low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// OHLCV field of a [`Bar`], used to locate malformed input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum BarField {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
}

/// A field that could not be read as a finite number and was coerced to zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct MalformedField {
    pub index: usize,
    pub field: BarField,
}

/// Data quality metadata produced while normalising raw bars.
#[derive(Debug, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct SeriesQuality {
    pub malformed: Vec<MalformedField>,
}

impl SeriesQuality {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }

    /// Number of distinct bars carrying at least one malformed field.
    pub fn malformed_bars(&self) -> usize {
        let mut indices = self
            .malformed
            .iter()
            .map(|malformed| malformed.index)
            .collect::<Vec<_>>();
        indices.dedup();
        indices.len()
    }
}

/// Single field of an un-normalised bar, as delivered by a market data provider.
///
/// Exchanges commonly encode prices as strings, so numeric strings are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
    Missing(()),
    Other(serde::de::IgnoredAny),
}

impl RawField {
    /// Finite numeric value of this field, if any.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawField::Number(value) => *value,
            RawField::Text(text) => text.trim().parse::<f64>().ok()?,
            RawField::Missing(()) | RawField::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Un-normalised bar. Timestamp is expressed in epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub timestamp: RawField,
    pub open: RawField,
    pub high: RawField,
    pub low: RawField,
    pub close: RawField,
    pub volume: RawField,
}

impl RawBar {
    /// Construct a [`RawBar`] from an exchange kline row:
    /// `[open_time_ms, open, high, low, close, volume, ..]`.
    ///
    /// Trailing columns are ignored and absent leading columns are treated as missing.
    pub fn from_row(row: &[RawField]) -> Self {
        let field = |index: usize| row.get(index).cloned().unwrap_or(RawField::Missing(()));
        Self {
            timestamp: field(0),
            open: field(1),
            high: field(2),
            low: field(3),
            close: field(4),
            volume: field(5),
        }
    }
}

/// Ordered, oldest-first window of [`Bar`]s for one symbol and [`Interval`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CandleSeries {
    symbol: SmolStr,
    interval: Interval,
    bars: Vec<Bar>,
    quality: SeriesQuality,
}

impl CandleSeries {
    /// Construct a clean [`CandleSeries`] from already normalised bars.
    ///
    /// Bars are sorted oldest-first by timestamp.
    pub fn new<S>(symbol: S, interval: Interval, mut bars: Vec<Bar>) -> Self
    where
        S: Into<SmolStr>,
    {
        bars.sort_by_key(|bar| bar.timestamp);
        Self {
            symbol: symbol.into(),
            interval,
            bars,
            quality: SeriesQuality::default(),
        }
    }

    /// Normalise raw provider bars into a [`CandleSeries`].
    ///
    /// Non-numeric or non-finite fields are coerced to zero and recorded in the
    /// [`SeriesQuality`] metadata. Bars are expected oldest-first; the input order is kept so the
    /// recorded indices stay valid.
    pub fn from_raw<S, Iter>(symbol: S, interval: Interval, raw: Iter) -> Self
    where
        S: Into<SmolStr>,
        Iter: IntoIterator<Item = RawBar>,
    {
        let mut quality = SeriesQuality::default();

        let bars = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let mut coerce = |field: BarField, value: &RawField| {
                    value.as_f64().unwrap_or_else(|| {
                        quality.malformed.push(MalformedField { index, field });
                        0.0
                    })
                };

                let millis = coerce(BarField::Timestamp, &raw.timestamp);
                let timestamp = DateTime::from_timestamp_millis(millis as i64).unwrap_or_default();

                Bar {
                    timestamp,
                    open: coerce(BarField::Open, &raw.open),
                    high: coerce(BarField::High, &raw.high),
                    low: coerce(BarField::Low, &raw.low),
                    close: coerce(BarField::Close, &raw.close),
                    volume: coerce(BarField::Volume, &raw.volume),
                }
            })
            .collect();

        Self {
            symbol: symbol.into(),
            interval,
            bars,
            quality,
        }
    }

    /// Keep only the most recent `capacity` bars.
    pub fn retain_latest(mut self, capacity: usize) -> Self {
        let excess = self.bars.len().saturating_sub(capacity);
        if excess > 0 {
            self.bars.drain(..excess);
            self.quality.malformed = self
                .quality
                .malformed
                .into_iter()
                .filter(|malformed| malformed.index >= excess)
                .map(|malformed| MalformedField {
                    index: malformed.index - excess,
                    field: malformed.field,
                })
                .collect();
        }
        self
    }

    pub fn symbol(&self) -> &SmolStr {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn quality(&self) -> &SeriesQuality {
        &self.quality
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bar `offset` positions before the latest bar (`0` is the latest).
    pub fn back(&self, offset: usize) -> Option<&Bar> {
        let index = self.bars.len().checked_sub(offset + 1)?;
        self.bars.get(index)
    }

    /// Index of the latest bar.
    pub fn last_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(values: [RawField; 6]) -> RawBar {
        RawBar::from_row(&values)
    }

    #[test]
    fn test_interval_from_str() {
        struct TestCase {
            input: &'static str,
            expected: Result<Interval, ParseIntervalError>,
        }

        let tests = vec![
            TestCase {
                // TC0: daily
                input: "1d",
                expected: Ok(Interval::D1),
            },
            TestCase {
                // TC1: case and whitespace insensitive
                input: " 4H ",
                expected: Ok(Interval::H4),
            },
            TestCase {
                // TC2: unsupported interval
                input: "2h",
                expected: Err(ParseIntervalError("2h".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.parse::<Interval>();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_bar_geometry() {
        let bar = Bar {
            timestamp: DateTime::<Utc>::MIN_UTC,
            open: 10.0,
            high: 15.0,
            low: 8.0,
            close: 12.0,
            volume: 1.0,
        };
        assert_eq!(bar.body(), 2.0);
        assert_eq!(bar.range(), 7.0);
        assert_eq!(bar.upper_shadow(), 3.0);
        assert_eq!(bar.lower_shadow(), 2.0);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
    }

    #[test]
    fn test_from_raw_flags_malformed_fields() {
        let series = CandleSeries::from_raw(
            "BTC",
            Interval::D1,
            vec![
                raw([
                    1_700_000_000_000.0.into(),
                    "10.5".into(),
                    "11".into(),
                    "10".into(),
                    "10.8".into(),
                    "1200".into(),
                ]),
                raw([
                    1_700_086_400_000.0.into(),
                    "10.8".into(),
                    "n/a".into(),
                    "10.1".into(),
                    f64::NAN.into(),
                    "900".into(),
                ]),
            ],
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].open, 10.5);
        assert_eq!(series.bars()[1].high, 0.0);
        assert_eq!(series.bars()[1].close, 0.0);
        assert_eq!(
            series.quality().malformed,
            vec![
                MalformedField { index: 1, field: BarField::High },
                MalformedField { index: 1, field: BarField::Close },
            ]
        );
        assert_eq!(series.quality().malformed_bars(), 1);
    }

    #[test]
    fn test_from_row_missing_columns() {
        let bar = RawBar::from_row(&[1.0.into(), "2".into()]);
        assert_eq!(bar.open, RawField::Text("2".to_string()));
        assert_eq!(bar.volume, RawField::Missing(()));
    }

    #[test]
    fn test_retain_latest_shifts_quality_indices() {
        let rows = (0..4).map(|index| {
            let close: RawField = if index == 3 { "bad".into() } else { 1.0.into() };
            raw([
                (index as f64 * 1000.0).into(),
                1.0.into(),
                1.0.into(),
                1.0.into(),
                close,
                1.0.into(),
            ])
        });

        let series = CandleSeries::from_raw("ETH", Interval::H1, rows).retain_latest(2);

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.quality().malformed,
            vec![MalformedField { index: 1, field: BarField::Close }]
        );
    }

    #[test]
    fn test_back_indexes_from_latest() {
        let bars = (0..3)
            .map(|index| Bar {
                timestamp: DateTime::from_timestamp(index * 60, 0).unwrap(),
                open: index as f64,
                high: index as f64,
                low: index as f64,
                close: index as f64,
                volume: 0.0,
            })
            .collect();
        let series = CandleSeries::new("SOL", Interval::M1, bars);

        assert_eq!(series.back(0).map(|bar| bar.close), Some(2.0));
        assert_eq!(series.back(2).map(|bar| bar.close), Some(0.0));
        assert!(series.back(3).is_none());
    }
}
