use super::{
    CycleReport, PairKey, ScanPhase, ScanUniverse,
    dedup::{DedupKey, DedupLedger},
    rate_limit::RateLimiter,
};
use crate::{
    clock::ScanClock,
    command::{Command, CommandError, USAGE},
    config::{ScanConfig, ScannerConfig},
    error::{ProviderError, ScanError},
    provider::{Destination, Dispatcher, MarketDataProvider, UniverseProvider},
    signal::{
        SignalRecord,
        composer::{Analysis, SignalComposer},
        market_name,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use parking_lot::RwLock;
use scanbot_ta::{CandleSeries, Interval};
use smol_str::SmolStr;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Single-market analysis requested outside the scheduled cycle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OnDemandRequest {
    pub symbol: SmolStr,
    /// Falls back to the first configured scan interval when absent.
    pub interval: Option<Interval>,
    /// Requester-specific address the result is replied to.
    pub reply_to: SmolStr,
}

/// Result of an [`OnDemandRequest`], already replied to the requester.
#[derive(Debug, Clone, PartialEq)]
pub enum OnDemandOutcome {
    Signal(SignalRecord),
    NoSignal,
    /// Fetch failed, so no analysis ran.
    DataUnavailable(ScanError),
    InsufficientHistory {
        bars: usize,
        required: usize,
    },
    /// Requested interval is not in the allowed set.
    Rejected(Interval),
}

/// Drives scan cycles (`Idle -> Fetching -> Analyzing -> Dispatching -> Idle`) over a
/// [`ScanUniverse`] and serves on-demand single-market requests.
///
/// Owns the process-wide [`DedupLedger`] and the [`RateLimiter`] shared by every outbound fetch.
/// Scheduled cycles are serialised; on-demand requests may run concurrently with a cycle and
/// bypass deduplication.
#[derive(Debug)]
pub struct ScanCoordinator<Provider, Universe, Dispatch, Clock> {
    config: ScanConfig,
    composer: SignalComposer,
    provider: Provider,
    universe: Universe,
    dispatcher: Dispatch,
    clock: Clock,
    limiter: RateLimiter,
    dedup: DedupLedger,
    phase: RwLock<ScanPhase>,
    latest: RwLock<Vec<SignalRecord>>,
    cycle: tokio::sync::Mutex<()>,
}

impl<Provider, Universe, Dispatch, Clock> ScanCoordinator<Provider, Universe, Dispatch, Clock>
where
    Provider: MarketDataProvider,
    Universe: UniverseProvider,
    Dispatch: Dispatcher,
    Clock: ScanClock,
{
    pub fn new(
        config: &ScannerConfig,
        provider: Provider,
        universe: Universe,
        dispatcher: Dispatch,
        clock: Clock,
    ) -> Self {
        Self {
            config: config.scan.clone(),
            composer: SignalComposer::from_config(config),
            provider,
            universe,
            dispatcher,
            clock,
            limiter: RateLimiter::from_config(&config.scan.rate_limit),
            dedup: DedupLedger::default(),
            phase: RwLock::new(ScanPhase::Idle),
            latest: RwLock::new(Vec::new()),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Current [`ScanPhase`] of the scheduled cycle.
    pub fn phase(&self) -> ScanPhase {
        *self.phase.read()
    }

    /// [`SignalRecord`]s composed by the most recently completed cycle.
    pub fn latest_signals(&self) -> Vec<SignalRecord> {
        self.latest.read().clone()
    }

    pub fn dedup(&self) -> &DedupLedger {
        &self.dedup
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run one scheduled scan cycle over the current universe.
    ///
    /// Per-pair fetch failures are recorded in the [`CycleReport`] and never abort the cycle.
    /// Only a failure to list the universe itself is returned as an error.
    pub async fn run_cycle(&self) -> Result<CycleReport, ScanError> {
        let _cycle = self.cycle.lock().await;
        let started_at = self.clock.time();
        self.dedup.purge_before(self.clock.today());

        self.transition(ScanPhase::Fetching);
        let symbols = match self.universe.list_universe().await {
            Ok(symbols) => symbols,
            Err(error) => {
                warn!(%error, "failed to list scan universe, skipping cycle");
                self.transition(ScanPhase::Idle);
                return Err(ScanError::UniverseUnavailable(error));
            }
        };

        let universe = ScanUniverse::new(symbols, &self.config.intervals);
        let mut report = CycleReport::new(started_at, universe.len());

        let fetched = futures::stream::iter(universe.pairs())
            .map(|pair| async move { (pair, self.fetch(pair).await) })
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect::<Vec<_>>()
            .await;

        self.transition(ScanPhase::Analyzing);
        let mut records = Vec::new();
        for (pair, result) in fetched {
            let series = match result {
                Ok(series) => series,
                Err(error) => {
                    warn!(%pair, %error, retryable = error.is_retryable(), "skipping pair");
                    report.failures.push(error);
                    continue;
                }
            };

            report.fetched += 1;
            match self.composer.analyse(&series) {
                Analysis::Signal(record) => records.push(record),
                Analysis::NoSignal => {}
                Analysis::InsufficientHistory { bars, required } => {
                    debug!(%pair, bars, required, "insufficient history");
                    report.insufficient += 1;
                }
            }
        }
        report.signals = records.len();

        self.transition(ScanPhase::Dispatching);
        let today = self.clock.today();
        for record in &records {
            let key = DedupKey::new(record.symbol.clone(), record.interval, today);
            if !self.dedup.try_claim(&key) {
                debug!(symbol = %record.symbol, interval = %record.interval, "suppressing duplicate signal");
                report.suppressed += 1;
                continue;
            }

            let text = record.render(&self.config.quote_asset);
            match self.dispatcher.send(&text, &Destination::Broadcast).await {
                Ok(()) => report.dispatched += 1,
                Err(dispatch_error) => {
                    error!(
                        symbol = %record.symbol,
                        interval = %record.interval,
                        %dispatch_error,
                        "failed to dispatch signal"
                    );
                    self.dedup.release(&key);
                    report.dispatch_failures += 1;
                }
            }
        }

        *self.latest.write() = records;
        self.dedup.purge_before(self.clock.today());
        self.transition(ScanPhase::Idle);

        info!(
            pairs = report.pairs,
            fetched = report.fetched,
            failures = report.failures.len(),
            insufficient = report.insufficient,
            signals = report.signals,
            dispatched = report.dispatched,
            suppressed = report.suppressed,
            dispatch_failures = report.dispatch_failures,
            "scan cycle complete"
        );

        Ok(report)
    }

    /// Analyse one market immediately and reply to the requester, bypassing deduplication.
    ///
    /// Returns an error only if the reply itself could not be dispatched.
    pub async fn analyse_on_demand(
        &self,
        request: OnDemandRequest,
    ) -> Result<OnDemandOutcome, ScanError> {
        let interval = request
            .interval
            .unwrap_or_else(|| self.config.default_interval());
        let pair = PairKey::new(&request.symbol, interval);
        let market = market_name(&pair.symbol, &self.config.quote_asset);

        if !self.config.is_allowed(interval) {
            self.reply(&self.invalid_interval(interval.as_str()), &request.reply_to)
                .await?;
            return Ok(OnDemandOutcome::Rejected(interval));
        }

        debug!(%pair, reply_to = %request.reply_to, "on-demand analysis");

        let (outcome, text) = match self.fetch(&pair).await {
            Err(error) => {
                warn!(%pair, %error, "on-demand fetch failed");
                (
                    OnDemandOutcome::DataUnavailable(error),
                    format!("Could not fetch data for {market} [{interval}]."),
                )
            }
            Ok(series) => match self.composer.analyse(&series) {
                Analysis::Signal(record) => {
                    let text = record.render(&self.config.quote_asset);
                    (OnDemandOutcome::Signal(record), text)
                }
                Analysis::NoSignal => (
                    OnDemandOutcome::NoSignal,
                    format!("No current signal for {market} [{interval}]."),
                ),
                Analysis::InsufficientHistory { bars, required } => (
                    OnDemandOutcome::InsufficientHistory { bars, required },
                    format!(
                        "Not enough data for {market} [{interval}]: {bars} of {required} bars."
                    ),
                ),
            },
        };

        self.reply(&text, &request.reply_to).await?;
        Ok(outcome)
    }

    /// Parse a chat `text` and reply to `reply_to` accordingly.
    ///
    /// Text that is not a command, and unknown commands, are ignored.
    pub async fn handle_command(&self, text: &str, reply_to: &str) -> Result<(), ScanError> {
        let reply_to = SmolStr::new(reply_to);

        match Command::from_str(text) {
            Ok(Command::Analyse { symbol, interval }) => {
                let request = OnDemandRequest {
                    symbol,
                    interval,
                    reply_to,
                };
                self.analyse_on_demand(request).await.map(|_| ())
            }
            Ok(Command::LatestSignals) => self.reply(&self.render_latest(), &reply_to).await,
            Err(CommandError::MissingSymbol) => self.reply(USAGE, &reply_to).await,
            Err(CommandError::InvalidInterval(interval)) => {
                self.reply(&self.invalid_interval(&interval), &reply_to)
                    .await
            }
            Err(error @ (CommandError::NotACommand | CommandError::Unknown(_))) => {
                debug!(%error, "ignoring chat text");
                Ok(())
            }
        }
    }

    /// Render the [`SignalRecord`]s of the most recently completed cycle as a summary reply.
    pub fn render_latest(&self) -> String {
        let latest = self.latest.read();
        if latest.is_empty() {
            return "No signals found in the last scan.".to_string();
        }

        format!(
            "Latest signals:\n\n{}",
            latest
                .iter()
                .map(|record| record.render(&self.config.quote_asset))
                .join("\n")
        )
    }

    /// Fetch the latest candles for `pair`. Waiting on the rate limiter counts towards the fetch
    /// timeout.
    async fn fetch(&self, pair: &PairKey) -> Result<CandleSeries, ScanError> {
        let timeout = self.config.fetch_timeout();
        let fetch = async {
            self.limiter.acquire().await;
            self.provider
                .fetch_candles(&pair.symbol, pair.interval, self.config.candle_limit)
                .await
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(series)) => {
                self.limiter.reset_backoff().await;
                Ok(series.retain_latest(self.config.candle_limit))
            }
            Ok(Err(error)) => {
                if error == ProviderError::RateLimited {
                    self.limiter.report_violation().await;
                }
                Err(ScanError::from_provider(pair.clone(), error))
            }
            Err(_) => Err(ScanError::FetchTimeout {
                pair: pair.clone(),
                timeout,
            }),
        }
    }

    async fn reply(&self, text: &str, reply_to: &SmolStr) -> Result<(), ScanError> {
        let destination = Destination::Reply(reply_to.clone());
        match self.dispatcher.send(text, &destination).await {
            Ok(()) => Ok(()),
            Err(dispatch_error) => {
                error!(%destination, %dispatch_error, "failed to dispatch reply");
                Err(ScanError::DispatchFailure {
                    destination,
                    error: dispatch_error,
                })
            }
        }
    }

    fn invalid_interval(&self, interval: &str) -> String {
        format!(
            "Invalid interval {interval}. Use: {}",
            self.config.allowed_intervals.iter().join(", ")
        )
    }

    fn transition(&self, next: ScanPhase) {
        let previous = std::mem::replace(&mut *self.phase.write(), next);
        debug!(from = %previous, to = %next, "scan phase transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        ManualClock, MockProvider, MockUniverse, RecordingDispatcher, flat_bars, zigzag_bars,
    };
    use chrono::{TimeDelta, TimeZone, Utc};

    type TestCoordinator =
        ScanCoordinator<MockProvider, MockUniverse, RecordingDispatcher, ManualClock>;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    fn coordinator(
        provider: MockProvider,
        symbols: &[&str],
        dispatcher: &RecordingDispatcher,
        clock: &ManualClock,
    ) -> TestCoordinator {
        ScanCoordinator::new(
            &ScannerConfig::default(),
            provider,
            MockUniverse::new(symbols.iter().copied()),
            dispatcher.clone(),
            clock.clone(),
        )
    }

    #[tokio::test]
    async fn test_run_cycle_dispatches_and_reports() {
        let provider = MockProvider::default()
            .with_bars("BTC", flat_bars(60, 10.0))
            .with_bars("ETH", zigzag_bars(40))
            .with_bars("SOL", flat_bars(10, 10.0))
            .with_error("XRP", ProviderError::NotFound);
        let dispatcher = RecordingDispatcher::default();
        let clock = clock();
        let coordinator = coordinator(
            provider,
            &["BTC", "ETH", "SOL", "XRP"],
            &dispatcher,
            &clock,
        );

        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(report.pairs, 4);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.insufficient, 1);
        assert_eq!(report.signals, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.suppressed, 0);
        assert_eq!(
            report.failures,
            vec![ScanError::DataUnavailable {
                pair: PairKey::new("XRP", Interval::D1),
                reason: ProviderError::NotFound
            }]
        );

        let messages = dispatcher.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].0.contains("BTC/USDT [1d]"));
        assert_eq!(messages[0].1, Destination::Broadcast);
        assert_eq!(coordinator.phase(), ScanPhase::Idle);
        assert_eq!(coordinator.latest_signals().len(), 1);
    }

    #[tokio::test]
    async fn test_same_day_signal_is_suppressed_until_next_day() {
        let provider = MockProvider::default().with_bars("BTC", flat_bars(60, 10.0));
        let dispatcher = RecordingDispatcher::default();
        let clock = clock();
        let coordinator = coordinator(provider, &["BTC"], &dispatcher, &clock);

        let first = coordinator.run_cycle().await.unwrap();
        clock.advance(TimeDelta::hours(6));
        let second = coordinator.run_cycle().await.unwrap();

        assert_eq!(first.dispatched, 1);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.suppressed, 1);
        assert_eq!(dispatcher.messages().len(), 1);

        clock.advance(TimeDelta::days(1));
        let third = coordinator.run_cycle().await.unwrap();
        assert_eq!(third.dispatched, 1);
        assert_eq!(dispatcher.messages().len(), 2);
        assert_eq!(coordinator.dedup().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_retried_next_cycle() {
        let provider = MockProvider::default().with_bars("BTC", flat_bars(60, 10.0));
        let dispatcher = RecordingDispatcher::failing();
        let clock = clock();
        let coordinator = coordinator(provider, &["BTC"], &dispatcher, &clock);

        let first = coordinator.run_cycle().await.unwrap();
        assert_eq!(first.dispatch_failures, 1);
        assert!(coordinator.dedup().is_empty());

        dispatcher.set_failing(false);
        let second = coordinator.run_cycle().await.unwrap();
        assert_eq!(second.dispatched, 1);
    }

    #[tokio::test]
    async fn test_universe_failure_returns_to_idle() {
        let dispatcher = RecordingDispatcher::default();
        let coordinator = ScanCoordinator::new(
            &ScannerConfig::default(),
            MockProvider::default(),
            MockUniverse::failing(ProviderError::Transient("down".to_string())),
            dispatcher.clone(),
            clock(),
        );

        assert_eq!(
            coordinator.run_cycle().await,
            Err(ScanError::UniverseUnavailable(ProviderError::Transient(
                "down".to_string()
            )))
        );
        assert_eq!(coordinator.phase(), ScanPhase::Idle);
        assert!(dispatcher.messages().is_empty());
    }

    #[tokio::test]
    async fn test_on_demand_replies() {
        let provider = MockProvider::default()
            .with_bars("BTC", flat_bars(60, 10.0))
            .with_bars("ETH", zigzag_bars(40))
            .with_bars("SOL", flat_bars(10, 10.0));
        let dispatcher = RecordingDispatcher::default();
        let clock = clock();
        let coordinator = coordinator(provider, &[], &dispatcher, &clock);

        struct TestCase {
            symbol: &'static str,
            interval: Option<Interval>,
            expected_reply: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: no signal
                symbol: "eth",
                interval: None,
                expected_reply: "No current signal for ETH/USDT [1d].",
            },
            TestCase {
                // TC1: too few bars
                symbol: "SOL",
                interval: Some(Interval::D1),
                expected_reply: "Not enough data for SOL/USDT [1d]: 10 of 22 bars.",
            },
            TestCase {
                // TC2: unknown market
                symbol: "DOGE",
                interval: Some(Interval::D1),
                expected_reply: "Could not fetch data for DOGE/USDT [1d].",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let request = OnDemandRequest {
                symbol: SmolStr::new(test.symbol),
                interval: test.interval,
                reply_to: SmolStr::new("chat-1"),
            };
            coordinator.analyse_on_demand(request).await.unwrap();

            let (text, destination) = dispatcher.messages().pop().unwrap();
            assert_eq!(text, test.expected_reply, "TC{} failed", index);
            assert_eq!(destination, Destination::Reply(SmolStr::new("chat-1")));
        }
    }

    #[tokio::test]
    async fn test_on_demand_bypasses_dedup() {
        let provider = MockProvider::default().with_bars("BTC", flat_bars(60, 10.0));
        let dispatcher = RecordingDispatcher::default();
        let clock = clock();
        let coordinator = coordinator(provider, &["BTC"], &dispatcher, &clock);

        coordinator.run_cycle().await.unwrap();
        let request = OnDemandRequest {
            symbol: SmolStr::new("BTC"),
            interval: None,
            reply_to: SmolStr::new("chat-1"),
        };

        for _ in 0..2 {
            let outcome = coordinator.analyse_on_demand(request.clone()).await.unwrap();
            assert!(matches!(outcome, OnDemandOutcome::Signal(_)));
        }

        assert_eq!(dispatcher.messages().len(), 3);
        assert_eq!(coordinator.dedup().len(), 1);
    }

    #[tokio::test]
    async fn test_on_demand_rejects_disallowed_interval() {
        let config = ScannerConfig {
            scan: ScanConfig {
                allowed_intervals: vec![Interval::H4, Interval::D1],
                ..ScanConfig::default()
            },
            ..ScannerConfig::default()
        };
        let provider = MockProvider::default();
        let dispatcher = RecordingDispatcher::default();
        let coordinator = ScanCoordinator::new(
            &config,
            provider.clone(),
            MockUniverse::default(),
            dispatcher.clone(),
            clock(),
        );

        let outcome = coordinator
            .analyse_on_demand(OnDemandRequest {
                symbol: SmolStr::new("BTC"),
                interval: Some(Interval::M1),
                reply_to: SmolStr::new("chat-1"),
            })
            .await
            .unwrap();

        assert_eq!(outcome, OnDemandOutcome::Rejected(Interval::M1));
        assert_eq!(
            dispatcher.messages()[0].0,
            "Invalid interval 1m. Use: 4h, 1d"
        );
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_handle_command() {
        let provider = MockProvider::default().with_bars("BTC", flat_bars(60, 10.0));
        let dispatcher = RecordingDispatcher::default();
        let clock = clock();
        let coordinator = coordinator(provider, &["BTC"], &dispatcher, &clock);

        coordinator.handle_command("/signals", "chat-1").await.unwrap();
        coordinator.handle_command("/signal", "chat-1").await.unwrap();
        coordinator.handle_command("/signal BTC 2h", "chat-1").await.unwrap();
        coordinator.handle_command("good morning", "chat-1").await.unwrap();
        coordinator.run_cycle().await.unwrap();
        coordinator.handle_command("/signals", "chat-1").await.unwrap();

        let replies = dispatcher
            .messages()
            .into_iter()
            .filter(|(_, destination)| *destination != Destination::Broadcast)
            .map(|(text, _)| text)
            .collect::<Vec<_>>();

        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0], "No signals found in the last scan.");
        assert_eq!(replies[1], USAGE);
        assert_eq!(
            replies[2],
            "Invalid interval 2h. Use: 1m, 5m, 15m, 1h, 4h, 1d, 1w"
        );
        assert!(replies[3].starts_with("Latest signals:\n\nSHORT - BTC/USDT [1d]"));
    }
}
