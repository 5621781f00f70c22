use std::collections::BTreeMap;
use std::fmt;

use crate::event::{EventKey, ScheduledEvent};

/// An event queue backed by an ordered map.
///
/// *O*(log *N*) insertion, pop and removal by key, with the minimum as the
/// first entry. Preferred when a predictable logarithmic worst case and
/// straightforward removal matter more than the heap's better constants;
/// this is the default discipline.
pub struct MapQueue<V> {
    events: BTreeMap<EventKey, ScheduledEvent<V>>,
}

impl<V> MapQueue<V> {
    /// Creates an empty `MapQueue`.
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
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

    /// Inserts an event record.
    ///
    /// # Panics
    ///
    /// Panics if a record with the same key is already enqueued: uids are
    /// unique, so a duplicate key is an internal consistency error.
    pub fn insert(&mut self, event: ScheduledEvent<V>) {
        let prev = self.events.insert(event.key(), event);
        assert!(
            prev.is_none(),
            "two distinct events were inserted with the same key"
        );
    }

    /// Returns the key of the next event, if any.
    pub fn peek_next(&self) -> Option<EventKey> {
        self.events.keys().next().copied()
    }

    /// Removes and returns the next event, if any.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        self.events.pop_first().map(|(_, event)| event)
    }

    /// Removes and returns the event with the provided key, if present.
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        self.events.remove(&key)
    }
}

impl<V> Default for MapQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MapQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapQueue")
            .field("len", &self.events.len())
            .finish_non_exhaustive()
    }
}
