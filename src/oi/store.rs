use crate::models::{Instrument, Sample};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

pub const DEFAULT_RETENTION_HOURS: i64 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Same timestamp as the latest sample (source has not moved); nothing was stored
    Duplicate,
    /// Timestamp older than the latest sample; nothing was stored
    Rejected,
}

/// OI history of one contract, oldest first
#[derive(Debug, Clone)]
pub struct Series {
    pub instrument: Instrument,
    samples: VecDeque<Sample>,
}

impl Series {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            samples: VecDeque::new(),
        }
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn push(&mut self, sample: Sample) -> AppendOutcome {
        if let Some(latest) = self.samples.back() {
            if sample.timestamp == latest.timestamp {
                return AppendOutcome::Duplicate;
            }
            if sample.timestamp < latest.timestamp {
                return AppendOutcome::Rejected;
            }
        }
        self.samples.push_back(sample);
        AppendOutcome::Appended
    }

    /// Newest sample with timestamp <= target
    pub fn nearest_at_or_before(&self, target: DateTime<Utc>) -> Option<&Sample> {
        self.samples.iter().rev().find(|s| s.timestamp <= target)
    }

    /// Drop samples older than cutoff, always keeping the latest one
    fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while self.samples.len() > 1 {
            match self.samples.front() {
                Some(front) if front.timestamp < cutoff => {
                    self.samples.pop_front();
                    removed += 1;
                }
                _ => break,
            }
        }
        removed
    }
}

/// Per-instrument OI time series, owned by the orchestrator
#[derive(Debug, Default)]
pub struct OiStore {
    series: HashMap<String, Series>,
}

impl OiStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, instrument: &Instrument, timestamp: DateTime<Utc>, oi: u64) -> AppendOutcome {
        let series = self
            .series
            .entry(instrument.id.clone())
            .or_insert_with(|| Series::new(instrument.clone()));

        let outcome = series.push(Sample::new(timestamp, oi));
        match outcome {
            AppendOutcome::Appended => {}
            AppendOutcome::Duplicate => {
                debug!(instrument = %instrument.id, %timestamp, "OI sample already stored");
            }
            AppendOutcome::Rejected => {
                warn!(
                    instrument = %instrument.id,
                    %timestamp,
                    latest = ?series.latest().map(|s| s.timestamp),
                    "discarding OI sample older than the latest"
                );
            }
        }
        outcome
    }

    pub fn get(&self, id: &str) -> Option<&Series> {
        self.series.get(id)
    }

    pub fn latest(&self, id: &str) -> Option<&Sample> {
        self.series.get(id).and_then(|s| s.latest())
    }

    pub fn nearest_at_or_before(&self, id: &str, target: DateTime<Utc>) -> Option<&Sample> {
        self.series.get(id).and_then(|s| s.nearest_at_or_before(target))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Prune every series to the retention horizon. Returns samples removed.
    pub fn prune(&mut self, now: DateTime<Utc>, horizon: Duration) -> usize {
        let cutoff = now - horizon;
        let removed: usize = self
            .series
            .values_mut()
            .map(|s| s.prune_before(cutoff))
            .sum();
        if removed > 0 {
            debug!(removed, %cutoff, "pruned OI samples");
        }
        removed
    }

    /// Remove series whose contract expired before `today`
    pub fn retire_expired(&mut self, today: NaiveDate) -> usize {
        let before = self.series.len();
        self.series.retain(|_, s| s.instrument.expiry >= today);
        before - self.series.len()
    }

    /// Remove series outside the active band whose latest sample is older than the horizon
    pub fn retire_inactive(
        &mut self,
        active: &HashSet<String>,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> usize {
        let cutoff = now - horizon;
        let before = self.series.len();
        self.series.retain(|id, s| {
            active.contains(id) || s.latest().is_some_and(|l| l.timestamp >= cutoff)
        });
        before - self.series.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::TimeZone;

    fn instrument(id: &str) -> Instrument {
        Instrument {
            id: id.to_string(),
            strike: 100.0,
            side: Side::Call,
            expiry: NaiveDate::from_ymd_opt(2025, 12, 30).unwrap(),
        }
    }

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 1, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_append_rejects_out_of_order_and_duplicates() {
        let mut store = OiStore::new();
        let inst = instrument("A");

        assert_eq!(store.append(&inst, t(10), 100), AppendOutcome::Appended);
        assert_eq!(store.append(&inst, t(10), 999), AppendOutcome::Duplicate);
        assert_eq!(store.append(&inst, t(5), 999), AppendOutcome::Rejected);
        assert_eq!(store.append(&inst, t(11), 120), AppendOutcome::Appended);

        let series = store.get("A").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(store.latest("A"), Some(&Sample::new(t(11), 120)));
    }

    #[test]
    fn test_nearest_at_or_before() {
        let mut store = OiStore::new();
        let inst = instrument("A");
        store.append(&inst, t(0), 1000);
        store.append(&inst, t(10), 1100);
        store.append(&inst, t(20), 1200);

        assert_eq!(store.nearest_at_or_before("A", t(15)).map(|s| s.oi), Some(1100));
        assert_eq!(store.nearest_at_or_before("A", t(10)).map(|s| s.oi), Some(1100));
        assert_eq!(store.nearest_at_or_before("A", t(59)).map(|s| s.oi), Some(1200));
        assert!(store.nearest_at_or_before("B", t(59)).is_none());
    }

    #[test]
    fn test_nearest_before_first_sample_is_none() {
        let mut store = OiStore::new();
        store.append(&instrument("A"), t(30), 0);
        assert!(store.nearest_at_or_before("A", t(29)).is_none());
    }

    #[test]
    fn test_prune_keeps_latest_sample() {
        let mut store = OiStore::new();
        let inst = instrument("A");
        store.append(&inst, t(0), 1);
        store.append(&inst, t(1), 2);

        let far_future = t(1) + Duration::days(10);
        let removed = store.prune(far_future, Duration::hours(DEFAULT_RETENTION_HOURS));

        assert_eq!(removed, 1);
        assert_eq!(store.latest("A").map(|s| s.oi), Some(2));
    }

    #[test]
    fn test_prune_within_horizon_is_noop() {
        let mut store = OiStore::new();
        let inst = instrument("A");
        store.append(&inst, t(0), 1);
        store.append(&inst, t(1), 2);

        assert_eq!(store.prune(t(30), Duration::hours(48)), 0);
        assert_eq!(store.get("A").unwrap().len(), 2);
    }

    #[test]
    fn test_retire_expired() {
        let mut store = OiStore::new();
        store.append(&instrument("A"), t(0), 1);

        assert_eq!(store.retire_expired(NaiveDate::from_ymd_opt(2025, 12, 30).unwrap()), 0);
        assert_eq!(store.retire_expired(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_retire_inactive_only_when_old() {
        let mut store = OiStore::new();
        store.append(&instrument("A"), t(0), 1);
        store.append(&instrument("B"), t(0), 1);

        let active: HashSet<String> = ["A".to_string()].into_iter().collect();

        assert_eq!(store.retire_inactive(&active, t(30), Duration::hours(1)), 0);
        assert_eq!(
            store.retire_inactive(&active, t(0) + Duration::hours(2), Duration::hours(1)),
            1
        );
        assert!(store.get("A").is_some());
        assert!(store.get("B").is_none());
    }
}
