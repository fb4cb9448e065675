use chrono::NaiveDate;
use derive_more::Constructor;
use fnv::{FnvHashMap, FnvHashSet};
use parking_lot::Mutex;
use scanbot_ta::Interval;
use smol_str::SmolStr;

/// Identifies an alert for one market on one interval during one UTC calendar day.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Constructor)]
pub struct DedupKey {
    pub symbol: SmolStr,
    pub interval: Interval,
    pub day: NaiveDate,
}

/// Records which [`DedupKey`]s have already been dispatched.
///
/// Claims are atomic, so concurrent callers racing on the same key observe exactly one winner.
/// Only days still of interest should be retained, see [`DedupLedger::purge_before`].
#[derive(Debug, Default)]
pub struct DedupLedger {
    days: Mutex<FnvHashMap<NaiveDate, FnvHashSet<(SmolStr, Interval)>>>,
}

impl DedupLedger {
    /// Claim `key` for dispatch. Returns `false` if it was already claimed.
    pub fn try_claim(&self, key: &DedupKey) -> bool {
        self.days
            .lock()
            .entry(key.day)
            .or_default()
            .insert((key.symbol.clone(), key.interval))
    }

    /// Release a previously claimed `key`, eg/ after the dispatch it guarded failed.
    pub fn release(&self, key: &DedupKey) {
        let mut days = self.days.lock();
        if let Some(pairs) = days.get_mut(&key.day) {
            pairs.remove(&(key.symbol.clone(), key.interval));
            if pairs.is_empty() {
                days.remove(&key.day);
            }
        }
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.days
            .lock()
            .get(&key.day)
            .is_some_and(|pairs| pairs.contains(&(key.symbol.clone(), key.interval)))
    }

    /// Drop every key recorded for a day before `day`.
    pub fn purge_before(&self, day: NaiveDate) {
        self.days.lock().retain(|recorded, _| *recorded >= day);
    }

    /// Total number of claimed keys across all retained days.
    pub fn len(&self) -> usize {
        self.days.lock().values().map(FnvHashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
