use std::collections::VecDeque;
use std::fmt;

use crate::event::{EventKey, ScheduledEvent};

/// An event queue backed by a sorted sequence.
///
/// `insert` scans from the front for the first record with a strictly
/// greater key and splices the new record before it: *O*(*N*) insertion,
/// *O*(1) peek and pop. This is the simplest possible discipline and serves
/// as the correctness reference for the others.
pub struct ListQueue<V> {
    events: VecDeque<ScheduledEvent<V>>,
}

impl<V> ListQueue<V> {
    /// Creates an empty `ListQueue`.
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Returns the number of enqueued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks whether the queue holds no event.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Inserts an event record, keeping the sequence sorted.
    pub fn insert(&mut self, event: ScheduledEvent<V>) {
        let key = event.key();
        match self.events.iter().position(|e| e.key() > key) {
            Some(idx) => self.events.insert(idx, event),
            None => self.events.push_back(event),
        }
    }

    /// Returns the key of the next event, if any.
    pub fn peek_next(&self) -> Option<EventKey> {
        self.events.front().map(|e| e.key())
    }

    /// Removes and returns the next event, if any.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        self.events.pop_front()
    }

    /// Removes and returns the event with the provided key, if present.
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        let idx = self.events.iter().position(|e| e.key() == key)?;

        self.events.remove(idx)
    }
}

impl<V> Default for ListQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ListQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListQueue")
            .field("len", &self.events.len())
            .finish_non_exhaustive()
    }
}
