use crate::error::ScanError;
use chrono::{DateTime, Utc};
use derive_more::Display;
use itertools::{Itertools, iproduct};
use scanbot_ta::Interval;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, StrExt};

/// [`ScanCoordinator`](coordinator::ScanCoordinator) driving scheduled cycles and on-demand
/// requests.
pub mod coordinator;

/// Once-per-day alert deduplication ledger.
pub mod dedup;

/// Adaptive token bucket throttling outbound fetches.
pub mod rate_limit;

/// Periodic driver for scheduled scan cycles.
pub mod schedule;

/// Unique identifier of a scanned market on a specific [`Interval`], eg/ "BTC [1d]".
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
#[display("{symbol} [{interval}]")]
pub struct PairKey {
    pub symbol: SmolStr,
    pub interval: Interval,
}

impl PairKey {
    /// Construct a [`PairKey`], normalising the symbol to uppercase.
    pub fn new<S>(symbol: S, interval: Interval) -> Self
    where
        S: AsRef<str>,
    {
        Self {
            symbol: symbol.as_ref().trim().to_uppercase_smolstr(),
            interval,
        }
    }
}

/// Lifecycle phase of the [`ScanCoordinator`](coordinator::ScanCoordinator).
///
/// `Idle -> Fetching -> Analyzing -> Dispatching -> Idle`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Display, Deserialize, Serialize)]
pub enum ScanPhase {
    #[default]
    Idle,
    Fetching,
    Analyzing,
    Dispatching,
}

/// Ordered set of [`PairKey`]s scanned in one cycle: every symbol crossed with every interval.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ScanUniverse {
    pairs: Vec<PairKey>,
}

impl ScanUniverse {
    /// Construct a [`ScanUniverse`], dropping duplicate symbols and intervals while preserving
    /// the order of first appearance.
    pub fn new<Symbols, S>(symbols: Symbols, intervals: &[Interval]) -> Self
    where
        Symbols: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|symbol| PairKey::new(symbol, Interval::D1).symbol)
            .filter(|symbol| !symbol.is_empty())
            .unique()
            .collect::<Vec<_>>();

        let intervals = intervals.iter().copied().unique().collect::<Vec<_>>();

        let pairs = iproduct!(symbols, intervals)
            .map(|(symbol, interval)| PairKey { symbol, interval })
            .collect();

        Self { pairs }
    }

    pub fn pairs(&self) -> &[PairKey] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Summary of a completed scan cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Pairs in the cycle's [`ScanUniverse`].
    pub pairs: usize,
    /// Pairs whose candles were fetched successfully.
    pub fetched: usize,
    /// Per-pair fetch failures. These never abort the cycle.
    pub failures: Vec<ScanError>,
    /// Pairs skipped for lacking warm-up history.
    pub insufficient: usize,
    /// Signals composed this cycle, dispatched or not.
    pub signals: usize,
    pub dispatched: usize,
    /// Signals withheld because the same pair already alerted today.
    pub suppressed: usize,
    pub dispatch_failures: usize,
}

impl CycleReport {
    pub fn new(started_at: DateTime<Utc>, pairs: usize) -> Self {
        Self {
            started_at,
            pairs,
            fetched: 0,
            failures: Vec::new(),
            insufficient: 0,
            signals: 0,
            dispatched: 0,
            suppressed: 0,
            dispatch_failures: 0,
        }
    }
}
