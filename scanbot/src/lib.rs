#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Scanbot
//! Scanbot periodically evaluates a universe of markets against a fixed set of technical-analysis
//! rules and emits human-readable alerts when a rule fires.
//!
//! ## Overview
//! At a high level it is made of de-coupled components that interact via a small set of traits:
//! * **Data**: the [`MarketDataProvider`](provider::MarketDataProvider) and
//!   [`UniverseProvider`](provider::UniverseProvider) traits govern where candles and the list of
//!   scanned symbols come from.
//! * **Signal**: the [`SignalComposer`](signal::composer::SignalComposer) turns a
//!   [`CandleSeries`](scanbot_ta::CandleSeries) and its indicators into an optional
//!   [`SignalRecord`](signal::SignalRecord).
//! * **Scan**: the [`ScanCoordinator`](scan::coordinator::ScanCoordinator) drives one scan cycle
//!   (`Idle -> Fetching -> Analyzing -> Dispatching -> Idle`), throttles outbound fetches,
//!   deduplicates alerts per calendar day and serves on-demand requests.
//! * **Dispatch**: the [`Dispatcher`](provider::Dispatcher) trait delivers rendered alert texts
//!   to a broadcast channel or a requester-specific reply address.
//!
//! ## Getting Started
//! ```
//! use scanbot::{
//!     clock::LiveClock,
//!     config::ScannerConfig,
//!     scan::coordinator::ScanCoordinator,
//!     test_util::{MockProvider, MockUniverse, RecordingDispatcher, flat_bars},
//! };
//!
//! # tokio_test::block_on(async {
//! let provider = MockProvider::default().with_bars("BTC", flat_bars(60, 10.0));
//! let universe = MockUniverse::new(["BTC"]);
//! let dispatcher = RecordingDispatcher::default();
//!
//! let coordinator = ScanCoordinator::new(
//!     &ScannerConfig::default(),
//!     provider,
//!     universe,
//!     dispatcher.clone(),
//!     LiveClock,
//! );
//!
//! let report = coordinator.run_cycle().await.unwrap();
//! assert_eq!(report.dispatched, 1);
//! assert_eq!(dispatcher.messages().len(), 1);
//! # });
//! ```

#[cfg(test)]
use tokio_test as _;

/// Time source used to stamp scan cycles and derive calendar-day dedup keys.
pub mod clock;

/// Chat-command grammar for on-demand requests.
pub mod command;

/// [`ScannerConfig`](config::ScannerConfig) and its sections.
pub mod config;

/// All errors generated in `scanbot`.
pub mod error;

/// `tracing` subscriber initialisation.
pub mod logging;

/// Collaborator traits the engine consumes, plus simple implementations.
pub mod provider;

/// Scan cycle coordination, deduplication and rate limiting.
pub mod scan;

/// Signal records and the composer that produces them.
pub mod signal;

/// Deterministic collaborators and candle builders for tests and examples.
pub mod test_util;
