/// Per-host replication-delay history
///
/// Each host gets a bounded FIFO of samples. Views handed out by
/// `series_for` share the buffer until the next write, which copies on demand,
/// so a view never changes after it is taken.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::utils::MAX_POINTS;

/// One observation of a metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            value: sanitize(value),
        }
    }
}

/// Non-finite and negative readings are stored as 0
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
struct HostSeries {
    samples: Arc<VecDeque<Sample>>,
}

impl HostSeries {
    fn push(&mut self, sample: Sample, cap: usize) {
        let samples = Arc::make_mut(&mut self.samples);

        // Keep insertion order chronological even if the clock steps back
        let sample = match samples.back() {
            Some(last) if sample.timestamp < last.timestamp => Sample {
                timestamp: last.timestamp,
                ..sample
            },
            _ => sample,
        };

        samples.push_back(sample);
        while samples.len() > cap {
            samples.pop_front();
        }
    }
}

/// Read-only snapshot of one host's history, oldest first
#[derive(Debug, Clone, Default)]
pub struct SeriesView {
    samples: Arc<VecDeque<Sample>>,
}

impl SeriesView {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Restartable: every call starts from the oldest sample
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.samples.iter().map(|s| (s.timestamp, s.value))
    }

    pub fn first(&self) -> Option<Sample> {
        self.samples.front().copied()
    }

    pub fn last(&self) -> Option<Sample> {
        self.samples.back().copied()
    }
}

/// Owner of every host's history
#[derive(Debug, Clone)]
pub struct SeriesStore {
    series: HashMap<String, HostSeries>,
    cap: usize,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POINTS)
    }

    /// Store keeping at most `cap` samples per host (at least one)
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            series: HashMap::new(),
            cap: cap.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Append a sample for `host`, evicting the oldest beyond the cap
    pub fn record(&mut self, host: &str, timestamp: i64, value: f64) {
        let cap = self.cap;
        self.series
            .entry(host.to_string())
            .or_default()
            .push(Sample::new(timestamp, value), cap);
    }

    /// Most recent sample, `None` when the host has no data
    pub fn latest(&self, host: &str) -> Option<Sample> {
        self.series.get(host).and_then(|s| s.samples.back().copied())
    }

    /// Snapshot of the host's history; empty for unknown hosts
    pub fn series_for(&self, host: &str) -> SeriesView {
        self.series
            .get(host)
            .map(|s| SeriesView {
                samples: Arc::clone(&s.samples),
            })
            .unwrap_or_default()
    }

    /// Hosts observed so far, sorted
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.series.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_keeps_last_thousand() {
        let mut store = SeriesStore::new();
        for i in 0..1500 {
            store.record("db1", i, i as f64);
        }

        let view = store.series_for("db1");
        assert_eq!(view.len(), 1000);
        assert_eq!(view.first().unwrap().value, 500.0);
        assert_eq!(view.last().unwrap().value, 1499.0);
    }

    #[test]
    fn test_short_history_kept_whole_and_ordered() {
        let mut store = SeriesStore::new();
        for i in 0..10 {
            store.record("db1", i * 1000, (i * 2) as f64);
        }

        let values: Vec<f64> = store.series_for("db1").iter().map(|(_, v)| v).collect();
        assert_eq!(values, (0..10).map(|i| (i * 2) as f64).collect::<Vec<_>>());

        let stamps: Vec<i64> = store.series_for("db1").iter().map(|(t, _)| t).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_backwards_timestamp_is_clamped() {
        let mut store = SeriesStore::new();
        store.record("db1", 5_000, 1.0);
        store.record("db1", 4_000, 2.0);

        let stamps: Vec<i64> = store.series_for("db1").iter().map(|(t, _)| t).collect();
        assert_eq!(stamps, vec![5_000, 5_000]);
        assert_eq!(store.latest("db1").unwrap().value, 2.0);
    }

    #[test]
    fn test_invalid_values_become_zero() {
        let mut store = SeriesStore::new();
        store.record("db1", 1, f64::NAN);
        store.record("db1", 2, f64::INFINITY);
        store.record("db1", 3, -4.0);

        assert!(store.series_for("db1").iter().all(|(_, v)| v == 0.0));
    }

    #[test]
    fn test_hosts_are_independent() {
        let mut store = SeriesStore::new();
        store.record("a", 1, 1.0);
        store.record("b", 1, 10.0);
        let before_b: Vec<_> = store.series_for("b").iter().collect();

        store.record("a", 2, 2.0);
        store.record("a", 3, 3.0);

        let after_b: Vec<_> = store.series_for("b").iter().collect();
        assert_eq!(before_b, after_b);
        assert_eq!(store.series_for("a").len(), 3);
        assert_eq!(store.hosts(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_view_is_a_snapshot() {
        let mut store = SeriesStore::with_capacity(3);
        store.record("db1", 1, 1.0);
        store.record("db1", 2, 2.0);
        let view = store.series_for("db1");

        store.record("db1", 3, 3.0);
        store.record("db1", 4, 4.0);

        let old: Vec<f64> = view.iter().map(|(_, v)| v).collect();
        assert_eq!(old, vec![1.0, 2.0]);
        // Restartable
        assert_eq!(view.iter().count(), 2);
        assert_eq!(view.iter().count(), 2);

        let new: Vec<f64> = store.series_for("db1").iter().map(|(_, v)| v).collect();
        assert_eq!(new, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_latest_without_data() {
        let store = SeriesStore::new();
        assert_eq!(store.latest("nope"), None);
        assert!(store.series_for("nope").is_empty());
    }

    #[test]
    fn test_latest_is_stable_between_writes() {
        let mut store = SeriesStore::new();
        store.record("db1", 10, 7.5);
        assert_eq!(store.latest("db1"), store.latest("db1"));
        assert_eq!(store.latest("db1"), Some(Sample::new(10, 7.5)));
    }
}
