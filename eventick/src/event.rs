//! Events, ordering keys and event identities.
//!
//! Every scheduled event is identified by an [`EventKey`], the pair of its
//! simulated due time and a unique, monotonically increasing insertion
//! sequence number (*uid*). Keys order events primarily by time; the uid
//! breaks ties so that same-instant events fire in FIFO order.
//!
//! An [`EventId`] is the caller-side handle to a scheduled event. It shares
//! the event's cancellation state with the record held by the queue, so it
//! can be cloned, sent to other threads and used to cancel the event at any
//! point before it fires.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::time::SimTime;

/// Uid of the invalid event id; never allocated to an event.
pub const UID_INVALID: u64 = 0;
/// Uid reserved for "now"-class relative ids; never allocated to an event.
pub const UID_NOW: u64 = 1;
/// Uid shared by all destroy-time events, which live outside the normal
/// time ordering.
pub const UID_DESTROY: u64 = 2;

/// First uid handed out to regular events.
pub(crate) const UID_FIRST: u64 = 3;

/// The ordering key of a scheduled event.
///
/// Implementation note: `EventKey` derives `PartialOrd`/`Ord`, which implies
/// that the lexicographic order between `time` and `uid` must be preserved so
/// that the due time has a higher sorting priority than the uid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// Simulated due time.
    pub time: SimTime,
    /// Insertion sequence number, unique within a simulation run.
    pub uid: u64,
}

/// Shared cancellation state of a scheduled event.
///
/// The state is shared between the queue record and any number of
/// [`EventId`] handles, possibly across threads.
#[derive(Clone, Debug)]
pub(crate) struct EventState {
    state: Arc<AtomicUsize>,
}

impl EventState {
    const IS_PENDING: usize = 0;
    const IS_CANCELLED: usize = 1;
    const IS_PROCESSED: usize = 2;

    /// Creates the state of a pending event.
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicUsize::new(Self::IS_PENDING)),
        }
    }

    /// Creates a state pre-marked as processed, for ids that refer to no
    /// live event.
    pub(crate) fn processed() -> Self {
        Self {
            state: Arc::new(AtomicUsize::new(Self::IS_PROCESSED)),
        }
    }

    /// Checks whether the event was cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Relaxed) == Self::IS_CANCELLED
    }

    /// Checks whether the event was already processed.
    pub(crate) fn is_processed(&self) -> bool {
        self.state.load(Ordering::Relaxed) == Self::IS_PROCESSED
    }

    /// Marks the event as processed.
    ///
    /// If the event cannot be processed because it was cancelled, `false` is
    /// returned.
    pub(crate) fn process(&self) -> bool {
        match self.state.compare_exchange(
            Self::IS_PENDING,
            Self::IS_PROCESSED,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => true,
            Err(s) => s == Self::IS_PROCESSED,
        }
    }

    /// Cancels the event if possible.
    ///
    /// If the event cannot be cancelled because it was already processed,
    /// `false` is returned.
    pub(crate) fn cancel(&self) -> bool {
        match self.state.compare_exchange(
            Self::IS_PENDING,
            Self::IS_CANCELLED,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => true,
            Err(s) => s == Self::IS_CANCELLED,
        }
    }
}

/// Handle to a scheduled event.
///
/// An `EventId` can be used to cancel a future event, either directly with
/// [`cancel()`](EventId::cancel) or through the owning simulation, and to
/// query the event's status.
#[derive(Clone, Debug)]
pub struct EventId {
    key: EventKey,
    state: EventState,
}

impl EventId {
    /// Creates an id that refers to no event; it is always expired.
    pub fn invalid() -> Self {
        Self {
            key: EventKey {
                time: SimTime::ZERO,
                uid: UID_INVALID,
            },
            state: EventState::processed(),
        }
    }

    /// Creates the id tracking a newly created event record.
    pub(crate) fn new(key: EventKey, state: EventState) -> Self {
        Self { key, state }
    }

    /// Returns the ordering key of the event.
    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Returns the simulated due time of the event.
    pub fn time(&self) -> SimTime {
        self.key.time
    }

    /// Returns the uid of the event.
    pub fn uid(&self) -> u64 {
        self.key.uid
    }

    /// Cancels the associated event if possible.
    ///
    /// The event record stays in the queue until its natural dequeue time
    /// but its callback is not invoked. Cancelling is idempotent and returns
    /// `false` only if the event was already processed.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    pub(crate) fn state(&self) -> &EventState {
        &self.state
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::invalid()
    }
}

/// A record stored in an event queue: the ordering key, the cancellation
/// state shared with the [`EventId`] handles, and an arbitrary payload,
/// typically the event's callback.
pub struct ScheduledEvent<V> {
    key: EventKey,
    state: EventState,
    value: V,
}

impl<V> ScheduledEvent<V> {
    /// Creates an event record along with the id that tracks it.
    pub fn new(key: EventKey, value: V) -> (Self, EventId) {
        let state = EventState::new();
        let id = EventId::new(key, state.clone());

        (Self { key, state, value }, id)
    }

    /// Returns the ordering key of the record.
    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Atomically marks the event as processed and yields its payload, or
    /// `None` if the event was cancelled.
    pub fn claim(self) -> Option<V> {
        if self.state.process() {
            Some(self.value)
        } else {
            None
        }
    }
}

impl<V> fmt::Debug for ScheduledEvent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(time: u64, uid: u64) -> EventKey {
        EventKey {
            time: SimTime::from_ticks(time),
            uid,
        }
    }

    #[test]
    fn event_key_order() {
        assert!(key(1, 7) < key(2, 3));
        assert!(key(2, 3) < key(2, 4));
        assert_eq!(key(2, 3), key(2, 3));
    }

    #[test]
    fn cancel_is_idempotent() {
        let (ev, id) = ScheduledEvent::new(key(5, 3), ());

        assert!(id.cancel());
        assert!(id.cancel());
        assert!(ev.claim().is_none());
    }

    #[test]
    fn cancel_after_claim_fails() {
        let (ev, id) = ScheduledEvent::new(key(5, 3), 42);

        assert_eq!(ev.claim(), Some(42));
        assert!(!id.cancel());
    }

    #[test]
    fn invalid_id_is_processed() {
        let id = EventId::invalid();

        assert_eq!(id.uid(), UID_INVALID);
        assert!(id.state().is_processed());
    }
}
