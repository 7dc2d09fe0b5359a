//! Step timing, passed in as a capability instead of a global counter.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait DurationCollector: Send + Sync {
    fn record(&self, step: &'static str, elapsed: Duration);
}

/// Accumulated `(calls, total)` per step. Safe to share between workers.
#[derive(Debug, Default)]
pub struct DurationTable {
    steps: Mutex<BTreeMap<&'static str, (u64, Duration)>>,
}

impl DurationTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, step: &str) -> Option<(u64, Duration)> {
        self.steps.lock().ok()?.get(step).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, (u64, Duration)> {
        self.steps
            .lock()
            .map(|steps| steps.clone())
            .unwrap_or_default()
    }
}

impl DurationCollector for DurationTable {
    fn record(&self, step: &'static str, elapsed: Duration) {
        if let Ok(mut steps) = self.steps.lock() {
            let entry = steps.entry(step).or_insert((0, Duration::ZERO));
            entry.0 += 1;
            entry.1 += elapsed;
        }
    }
}

/// Records the time until drop, if a collector is attached.
pub(crate) struct StepTimer<'a> {
    collector: Option<&'a dyn DurationCollector>,
    step: &'static str,
    start: Instant,
}

impl<'a> StepTimer<'a> {
    pub(crate) fn start(collector: Option<&'a dyn DurationCollector>, step: &'static str) -> Self {
        Self {
            collector,
            step,
            start: Instant::now(),
        }
    }
}

impl Drop for StepTimer<'_> {
    fn drop(&mut self) {
        if let Some(c) = self.collector {
            c.record(self.step, self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_accumulates_per_step() {
        let table = DurationTable::new();

        table.record("a", Duration::from_millis(2));
        table.record("a", Duration::from_millis(3));
        table.record("b", Duration::from_millis(1));

        assert_eq!(table.get("a"), Some((2, Duration::from_millis(5))));
        assert_eq!(table.get("b"), Some((1, Duration::from_millis(1))));
        assert_eq!(table.get("c"), None);
        assert_eq!(table.snapshot().len(), 2);
    }

    #[test]
    fn timer_records_on_drop() {
        let table = DurationTable::new();
        let collector: &dyn DurationCollector = &*table;

        {
            let _t = StepTimer::start(Some(collector), "step");
        }
        {
            let _t = StepTimer::start(None, "ignored");
        }

        assert_eq!(table.get("step").map(|(n, _)| n), Some(1));
        assert_eq!(table.get("ignored"), None);
    }
}
