//! In-memory run registry
//!
//! Run state and each run's event log live behind one mutex, so publishing a
//! `*_finished` event, appending the record and bumping `done` happen as one
//! step. Runs are never evicted.

use super::bus::{EventLog, Read, Subscription};
use crate::types::{RunEvent, RunId, RunKind, RunProgress, RunRecord, RunTotals};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

struct RunEntry {
    kind: RunKind,
    total: usize,
    done: usize,
    records: Vec<RunRecord>,
    started: Instant,
    log: EventLog,
}

/// Every run this process has started
pub(crate) struct Registry {
    runs: Mutex<HashMap<RunId, RunEntry>>,
    event_capacity: usize,
}

impl Registry {
    pub(crate) fn new(event_capacity: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            event_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RunId, RunEntry>> {
        // a panicking holder cannot leave the map half-updated
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a run; false if the id is already taken
    pub(crate) fn register(&self, run_id: &RunId, kind: RunKind, total: usize) -> bool {
        let mut runs = self.lock();
        if runs.contains_key(run_id) {
            return false;
        }
        runs.insert(
            run_id.clone(),
            RunEntry {
                kind,
                total,
                done: 0,
                records: Vec::with_capacity(total),
                started: Instant::now(),
                log: EventLog::new(self.event_capacity),
            },
        );
        true
    }

    pub(crate) fn publish(&self, run_id: &RunId, event: RunEvent) -> bool {
        match self.lock().get_mut(run_id) {
            Some(entry) => entry.log.publish(run_id, event),
            None => false,
        }
    }

    /// Announce and store one finished task
    pub(crate) fn complete_task(&self, run_id: &RunId, record: RunRecord) -> Option<RunProgress> {
        let mut runs = self.lock();
        let entry = runs.get_mut(run_id)?;
        if entry.done >= entry.total {
            tracing::error!(run_id = %run_id, "task completed after run was terminal; ignoring");
            return None;
        }
        entry.log.publish(run_id, record.finished_event(run_id));
        entry.records.push(record);
        entry.done += 1;
        Some(RunProgress {
            total: entry.total,
            done: entry.done,
        })
    }

    /// Publish `run_finished` and retire the run's bus
    pub(crate) fn finish(&self, run_id: &RunId, summary: Option<String>) -> Option<RunTotals> {
        let mut runs = self.lock();
        let entry = runs.get_mut(run_id)?;
        let ok = entry.records.iter().filter(|r| r.is_success()).count();
        let totals = RunTotals {
            ok,
            err: entry.records.len() - ok,
            time_ms: entry.started.elapsed().as_millis() as u64,
        };
        entry.log.publish_final(RunEvent::RunFinished {
            run_id: run_id.clone(),
            totals,
            summary,
        });
        entry.log.retire(run_id);
        Some(totals)
    }

    pub(crate) fn progress(&self, run_id: &RunId) -> Option<RunProgress> {
        self.lock().get(run_id).map(|entry| RunProgress {
            total: entry.total,
            done: entry.done,
        })
    }

    pub(crate) fn records(&self, run_id: &RunId) -> Option<Vec<RunRecord>> {
        self.lock().get(run_id).map(|entry| entry.records.clone())
    }

    pub(crate) fn kind(&self, run_id: &RunId) -> Option<RunKind> {
        self.lock().get(run_id).map(|entry| entry.kind)
    }

    pub(crate) fn subscribe(self: &Arc<Self>, run_id: &RunId) -> Subscription {
        let attached = {
            let mut runs = self.lock();
            match runs.get_mut(run_id) {
                Some(entry) if !entry.log.is_retired() => Some(entry.log.attach()),
                _ => None,
            }
        };
        match attached {
            Some((id, notify)) => Subscription::attached(self.clone(), run_id.clone(), id, notify),
            None => Subscription::ended(self.clone(), run_id.clone()),
        }
    }

    pub(crate) fn read(&self, run_id: &RunId, subscriber: u64) -> Read {
        match self.lock().get_mut(run_id) {
            Some(entry) => entry.log.read(subscriber),
            None => Read::End,
        }
    }

    pub(crate) fn detach(&self, run_id: &RunId, subscriber: u64) {
        if let Some(entry) = self.lock().get_mut(run_id) {
            entry.log.detach(subscriber);
        }
    }
}
