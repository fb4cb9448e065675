use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Type of crossover event detected between two data series.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
pub enum Cross {
    /// Fast series crossed above the slow series.
    Above,
    /// Fast series crossed below the slow series.
    Below,
}

/// Determine if a crossover occurred between the previous and current values.
///
/// At most one [`Cross`] can be returned for a given pair of observations.
pub fn crossover(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<Cross> {
    if prev_fast <= prev_slow && fast > slow {
        Some(Cross::Above)
    } else if prev_fast >= prev_slow && fast < slow {
        Some(Cross::Below)
    } else {
        None
    }
}

/// Detect a crossover between two index-aligned indicator sequences on their latest value only.
///
/// Returns `None` if the sequences are misaligned or either side is undefined on the latest or
/// previous index.
pub fn latest_crossover(fast: &[Option<f64>], slow: &[Option<f64>]) -> Option<Cross> {
    if fast.len() != slow.len() || fast.len() < 2 {
        return None;
    }

    let last = fast.len() - 1;
    crossover(
        fast[last - 1]?,
        slow[last - 1]?,
        fast[last]?,
        slow[last]?,
    )
}

/// `true` iff the fast sequence crossed above the slow sequence on the latest value.
pub fn golden_cross(fast: &[Option<f64>], slow: &[Option<f64>]) -> bool {
    latest_crossover(fast, slow) == Some(Cross::Above)
}

/// `true` iff the fast sequence crossed below the slow sequence on the latest value.
pub fn death_cross(fast: &[Option<f64>], slow: &[Option<f64>]) -> bool {
    latest_crossover(fast, slow) == Some(Cross::Below)
}
