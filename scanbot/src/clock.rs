use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Defines how the [`ScanCoordinator`](crate::scan::coordinator::ScanCoordinator) determines
/// the current time.
///
/// Generally a [`LiveClock`] is used in production and a
/// [`ManualClock`](crate::test_util::ManualClock) in tests.
pub trait ScanClock: Send + Sync {
    fn time(&self) -> DateTime<Utc>;

    /// Current UTC calendar day, used to key alert deduplication.
    fn today(&self) -> NaiveDate {
        self.time().date_naive()
    }
}

/// Live `Clock` using `Utc::now()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize)]
pub struct LiveClock;

impl ScanClock for LiveClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
