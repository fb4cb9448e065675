use chrono::DateTime;
use scanbot_ta::{
    candle::{RawBar, RawField},
    crossover::latest_crossover,
    indicators::{ema, rsi},
    patterns::recognize,
    Bar, CandleSeries, Cross, IndicatorConfig, IndicatorSet, Interval, PatternConfig, PatternKind,
    RsiSmoothing,
};

fn flat_series(len: usize, price: f64) -> CandleSeries {
    let bars = (0..len)
        .map(|index| Bar {
            timestamp: DateTime::from_timestamp(index as i64 * 86_400, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 10.0,
        })
        .collect();
    CandleSeries::new("BTC", Interval::D1, bars)
}

#[test]
fn flat_series_is_doji_and_loss_free() {
    let series = flat_series(40, 10.0);
    let set = IndicatorSet::compute(&series, &IndicatorConfig::default());

    assert_eq!(set.rsi.last().copied().flatten(), Some(100.0));
    let kinds = recognize(&series, &PatternConfig::default())
        .into_iter()
        .map(|tag| tag.kind)
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec![PatternKind::Doji]);
}

#[test]
fn non_decreasing_closes_yield_rsi_of_100() {
    let closes = [1.0, 1.0, 2.0, 2.0, 3.5, 3.5, 3.5, 4.0, 5.0, 5.0, 6.0, 6.0, 7.0, 8.0, 8.0, 9.0];
    for smoothing in [RsiSmoothing::Wilder, RsiSmoothing::Exponential] {
        let values = rsi(&closes, 14, smoothing);
        assert_eq!(values.last().copied().flatten(), Some(100.0));
        assert!(values.iter().flatten().all(|value| value.is_finite()));
    }
}

#[test]
fn ema_pairs_cross_on_reversal() {
    let mut closes = vec![20.0; 30];
    closes.extend([10.0, 9.0, 8.0]);

    let fast = ema(&closes, 3);
    let slow = ema(&closes, 8);

    assert_eq!(latest_crossover(&fast[..31], &slow[..31]), Some(Cross::Below));
    assert_eq!(latest_crossover(&fast, &slow), None);
}

#[test]
fn exchange_kline_rows_normalise() {
    let json = r#"[
        [1700000000000, "100.0", "110.0", "95.0", "105.0", "1000.0", 1700086399999, "0", 10],
        [1700086400000, "105.0", null, "100.0", "abc", "900.0", 1700172799999, "0", 10]
    ]"#;
    let rows: Vec<Vec<RawField>> = serde_json::from_str(json).unwrap();
    let series = CandleSeries::from_raw(
        "ETH",
        Interval::D1,
        rows.iter().map(|row| RawBar::from_row(row)),
    );

    assert_eq!(series.len(), 2);
    assert_eq!(series.bars()[0].close, 105.0);
    assert_eq!(
        series.bars()[0].timestamp,
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    );
    assert_eq!(series.quality().malformed.len(), 2);
    assert_eq!(series.quality().malformed_bars(), 1);
}
