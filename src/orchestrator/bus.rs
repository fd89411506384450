//! Per-run event bus
//!
//! Each run owns one bounded [`EventLog`] inside the registry. Subscribers
//! share the log and keep their own read cursor, so every observer sees the
//! same interleaving and a late subscriber replays whatever is still
//! retained. Events every live subscriber has read are trimmed; with no
//! subscriber attached everything is retained up to capacity.

use super::registry::Registry;
use crate::types::{RunEvent, RunId};
use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// What a subscriber receives
#[derive(Clone, Debug)]
pub enum BusMessage {
    /// Next event of the run
    Event(RunEvent),
    /// The run is over and nothing else will arrive
    End,
}

/// Result of a non-blocking read
pub(crate) enum Read {
    Event(RunEvent),
    End,
    Pending,
}

/// Bounded, shared, cursor-based event log of one run
pub(crate) struct EventLog {
    events: VecDeque<RunEvent>,
    /// Sequence number of `events[0]`
    base: u64,
    cursors: HashMap<u64, u64>,
    next_subscriber: u64,
    capacity: usize,
    retired: bool,
    dropped: u64,
    notify: Arc<Notify>,
}

impl EventLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            base: 0,
            cursors: HashMap::new(),
            next_subscriber: 0,
            capacity: capacity.max(1),
            retired: false,
            dropped: 0,
            notify: Arc::new(Notify::new()),
        }
    }

    fn end_seq(&self) -> u64 {
        self.base + self.events.len() as u64
    }

    /// Append an event; never blocks. Returns false if it was dropped.
    pub(crate) fn publish(&mut self, run_id: &RunId, event: RunEvent) -> bool {
        if self.retired {
            return false;
        }
        self.trim();
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            if self.dropped == 1 {
                tracing::warn!(
                    run_id = %run_id,
                    event = event.event_type(),
                    capacity = self.capacity,
                    "event buffer full, dropping events"
                );
            } else {
                tracing::debug!(run_id = %run_id, event = event.event_type(), "event dropped");
            }
            return false;
        }
        self.events.push_back(event);
        self.notify.notify_waiters();
        true
    }

    /// Append the run's last event, past capacity if the log is full
    pub(crate) fn publish_final(&mut self, event: RunEvent) {
        if self.retired {
            return;
        }
        self.trim();
        self.events.push_back(event);
        self.notify.notify_waiters();
    }

    /// Stop accepting events and wake every subscriber
    pub(crate) fn retire(&mut self, run_id: &RunId) {
        self.retired = true;
        if self.dropped > 0 {
            tracing::warn!(run_id = %run_id, dropped = self.dropped, "run finished with dropped events");
        }
        if self.cursors.is_empty() {
            self.events.clear();
        }
        self.notify.notify_waiters();
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }

    /// Register a subscriber positioned at the oldest retained event
    pub(crate) fn attach(&mut self) -> (u64, Arc<Notify>) {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.cursors.insert(id, self.base);
        (id, self.notify.clone())
    }

    pub(crate) fn detach(&mut self, subscriber: u64) {
        self.cursors.remove(&subscriber);
        if self.retired && self.cursors.is_empty() {
            self.events.clear();
        } else {
            self.trim();
        }
    }

    pub(crate) fn read(&mut self, subscriber: u64) -> Read {
        let Some(cursor) = self.cursors.get(&subscriber).copied() else {
            return Read::End;
        };
        let cursor = cursor.max(self.base);
        if cursor < self.end_seq() {
            let index = (cursor - self.base) as usize;
            let event = self.events[index].clone();
            self.cursors.insert(subscriber, cursor + 1);
            self.trim();
            Read::Event(event)
        } else if self.retired {
            Read::End
        } else {
            Read::Pending
        }
    }

    /// Events not yet read by every live subscriber
    pub(crate) fn pending(&self) -> usize {
        self.events.len()
    }

    fn trim(&mut self) {
        let Some(min) = self.cursors.values().copied().min() else {
            return;
        };
        while self.base < min && !self.events.is_empty() {
            self.events.pop_front();
            self.base += 1;
        }
    }
}

/// A subscriber's view of one run's events
///
/// Drain with [`Subscription::next`] until [`BusMessage::End`]. Dropping the
/// subscription releases its cursor.
pub struct Subscription {
    registry: Arc<Registry>,
    run_id: RunId,
    state: SubscriptionState,
}

enum SubscriptionState {
    Attached { id: u64, notify: Arc<Notify> },
    Ended,
}

impl Subscription {
    pub(crate) fn attached(registry: Arc<Registry>, run_id: RunId, id: u64, notify: Arc<Notify>) -> Self {
        Self {
            registry,
            run_id,
            state: SubscriptionState::Attached { id, notify },
        }
    }

    pub(crate) fn ended(registry: Arc<Registry>, run_id: RunId) -> Self {
        Self {
            registry,
            run_id,
            state: SubscriptionState::Ended,
        }
    }

    /// Run this subscription follows
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Wait for the next message
    ///
    /// Returns `End` forever once the run has been retired and drained.
    pub async fn next(&mut self) -> BusMessage {
        let (id, notify) = match &self.state {
            SubscriptionState::Attached { id, notify } => (*id, notify.clone()),
            SubscriptionState::Ended => return BusMessage::End,
        };

        loop {
            let notified = notify.notified();
            tokio::pin!(notified);
            // register interest before checking, so a publish in between is not missed
            notified.as_mut().enable();

            match self.registry.read(&self.run_id, id) {
                Read::Event(event) => return BusMessage::Event(event),
                Read::End => {
                    self.finish();
                    return BusMessage::End;
                }
                Read::Pending => notified.await,
            }
        }
    }

    /// Consume the subscription as a stream of events ending at `End`
    pub fn into_stream(self) -> impl Stream<Item = RunEvent> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            match subscription.next().await {
                BusMessage::Event(event) => Some((event, subscription)),
                BusMessage::End => None,
            }
        })
    }

    fn finish(&mut self) {
        if let SubscriptionState::Attached { id, .. } =
            std::mem::replace(&mut self.state, SubscriptionState::Ended)
        {
            self.registry.detach(&self.run_id, id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("run_id", &self.run_id)
            .field("ended", &matches!(self.state, SubscriptionState::Ended))
            .finish()
    }
}
