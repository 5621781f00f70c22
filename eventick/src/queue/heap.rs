use std::fmt;

use crate::event::{EventKey, ScheduledEvent};

/// An event queue backed by an array-based binary min-heap.
///
/// The heap is ordered by the strict `(time, uid)` key comparison; since
/// uids are unique, two distinct records never compare equal, which is
/// required for the sift operations to define a total order.
///
/// *O*(log *N*) insertion and pop, *O*(1) peek. Arbitrary removal first
/// locates the record with a linear scan, then restores the heap shape with
/// a single sift, as the record identity is not cross-indexed.
pub struct BinaryHeapQueue<V> {
    heap: Vec<ScheduledEvent<V>>,
}

impl<V> BinaryHeapQueue<V> {
    /// Creates an empty `BinaryHeapQueue`.
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    /// Returns the number of enqueued events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Checks whether the queue holds no event.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts an event record.
    pub fn insert(&mut self, event: ScheduledEvent<V>) {
        self.heap.push(event);
        self.sift_up(self.heap.len() - 1);
    }

    /// Returns the key of the next event, if any.
    pub fn peek_next(&self) -> Option<EventKey> {
        self.heap.first().map(|e| e.key())
    }

    /// Removes and returns the next event, if any.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        if self.heap.is_empty() {
            return None;
        }
        let event = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Some(event)
    }

    /// Removes and returns the event with the provided key, if present.
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        let idx = self.heap.iter().position(|e| e.key() == key)?;
        let event = self.heap.swap_remove(idx);

        // The record moved into the vacant spot may order either way with
        // respect to its new parent.
        if idx < self.heap.len() {
            if idx > 0 && self.heap[idx].key() < self.heap[(idx - 1) / 2].key() {
                self.sift_up(idx);
            } else {
                self.sift_down(idx);
            }
        }

        Some(event)
    }

    /// Moves the record at `idx` up the heap while a parent has a larger
    /// key.
    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].key() >= self.heap[parent].key() {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    /// Moves the record at `idx` down the heap while a child has a smaller
    /// key.
    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let mut child = 2 * idx + 1;
            if child >= self.heap.len() {
                break;
            }
            // If the sibling exists and has a smaller key, make it the
            // candidate for swapping.
            if child + 1 < self.heap.len() && self.heap[child + 1].key() < self.heap[child].key() {
                child += 1;
            }
            if self.heap[idx].key() <= self.heap[child].key() {
                break;
            }
            self.heap.swap(idx, child);
            idx = child;
        }
    }
}

impl<V> Default for BinaryHeapQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for BinaryHeapQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryHeapQueue")
            .field("len", &self.heap.len())
            .finish_non_exhaustive()
    }
}
