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

//! Technical analysis utilities for Scanbot.
//!
//! This crate provides candle normalisation, indicators, candle pattern
//! recognition and crossover detection. Everything here is pure and
//! synchronous: a [`CandleSeries`](candle::CandleSeries) goes in, derived
//! values come out, and nothing is mutated afterwards.

#[cfg(test)]
use serde_json as _;

pub mod candle;
pub mod crossover;
pub mod indicators;
pub mod patterns;

pub use candle::{Bar, CandleSeries, Interval};
pub use crossover::{Cross, crossover};
pub use indicators::{IndicatorConfig, IndicatorSet, RsiSmoothing};
pub use patterns::{PatternConfig, PatternKind, PatternTag, StarIndecision};
