use super::coordinator::ScanCoordinator;
use crate::{
    clock::ScanClock,
    provider::{Dispatcher, MarketDataProvider, UniverseProvider},
};
use std::{future::Future, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run [`ScanCoordinator::run_cycle`] every `period` until `shutdown` resolves.
///
/// The first cycle runs immediately. Ticks missed while a cycle is still running are skipped
/// rather than bunched up, and an in-flight cycle is always allowed to finish.
///
/// Returns the number of cycles that were run.
pub async fn run_scheduled<Provider, Universe, Dispatch, Clock, Shutdown>(
    coordinator: &ScanCoordinator<Provider, Universe, Dispatch, Clock>,
    period: Duration,
    shutdown: Shutdown,
) -> usize
where
    Provider: MarketDataProvider,
    Universe: UniverseProvider,
    Dispatch: Dispatcher,
    Clock: ScanClock,
    Shutdown: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(?period, "scheduled scanning started");

    let mut cycles = 0;
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            _ = ticker.tick() => {
                if let Err(error) = coordinator.run_cycle().await {
                    warn!(%error, "scan cycle failed");
                }
                cycles += 1;
            }
        }
    }

    info!(cycles, "scheduled scanning stopped");
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::LiveClock,
        config::ScannerConfig,
        test_util::{MockProvider, MockUniverse, RecordingDispatcher, flat_bars},
    };

    #[tokio::test]
    async fn test_run_scheduled_until_shutdown() {
        let dispatcher = RecordingDispatcher::default();
        let coordinator = ScanCoordinator::new(
            &ScannerConfig::default(),
            MockProvider::default().with_bars("BTC", flat_bars(60, 10.0)),
            MockUniverse::new(["BTC"]),
            dispatcher.clone(),
            LiveClock,
        );

        let cycles = run_scheduled(
            &coordinator,
            Duration::from_millis(20),
            tokio::time::sleep(Duration::from_millis(70)),
        )
        .await;

        assert!(cycles >= 2, "expected at least 2 cycles, ran {cycles}");
        // Same day, so only the first cycle dispatches
        assert_eq!(dispatcher.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_run_scheduled_immediate_shutdown() {
        let coordinator = ScanCoordinator::new(
            &ScannerConfig::default(),
            MockProvider::default(),
            MockUniverse::new(["BTC"]),
            RecordingDispatcher::default(),
            LiveClock,
        );

        let cycles = run_scheduled(
            &coordinator,
            Duration::from_millis(10),
            std::future::ready(()),
        )
        .await;
        assert_eq!(cycles, 0);
    }
}
