//! Time-ordered event queues.
//!
//! This module provides the queue disciplines that back a simulation's
//! scheduler. All disciplines expose the same contract (insert, peek/pop
//! the minimum-key record, arbitrary removal by key) and yield events in
//! the exact same `(time, uid)` order; they only differ in their complexity
//! profile:
//!
//! | Discipline                            | insert        | pop           | remove        |
//! |---------------------------------------|---------------|---------------|---------------|
//! | [`ListQueue`]                         | *O*(*N*)      | *O*(1)        | *O*(*N*)      |
//! | [`BinaryHeapQueue`]                   | *O*(log *N*)  | *O*(log *N*)  | *O*(*N*)      |
//! | [`MapQueue`]                          | *O*(log *N*)  | *O*(log *N*)  | *O*(log *N*)  |
//! | [`CalendarQueue`], [`Ns2CalendarQueue`] | *O*(1) amortized | *O*(1) amortized | *O*(bucket) |
//!
//! The set of disciplines is closed: [`EventQueue`] wraps them in a plain
//! enum dispatched by `match`, and a discipline is chosen once through
//! [`QueueDiscipline`] before the simulation starts.
//!
//! # Examples
//!
//! ```
//! use eventick::event::{EventKey, ScheduledEvent};
//! use eventick::queue::{EventQueue, QueueDiscipline};
//! use eventick::time::SimTime;
//!
//! let mut queue = EventQueue::new(QueueDiscipline::Calendar);
//!
//! for (uid, time) in [(0u64, 10u64), (1, 5), (2, 5), (3, 20)] {
//!     let key = EventKey { time: SimTime::from_ticks(time), uid };
//!     queue.insert(ScheduledEvent::new(key, uid).0);
//! }
//!
//! let mut order = Vec::new();
//! while let Some(event) = queue.pop_next() {
//!     order.push(event.claim().unwrap());
//! }
//!
//! // Same-instant events are dequeued in insertion order.
//! assert_eq!(order, [1, 2, 0, 3]);
//! ```

mod calendar;
mod heap;
mod list;
mod map;
mod ns2;

pub use calendar::CalendarQueue;
pub use heap::BinaryHeapQueue;
pub use list::ListQueue;
pub use map::MapQueue;
pub use ns2::Ns2CalendarQueue;

use std::fmt;

use crate::event::{EventKey, ScheduledEvent};

/// The queue discipline backing a simulation.
///
/// This is the scheduler-selection switch: it is consumed once when the
/// simulation is built and cannot be changed afterwards.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueueDiscipline {
    /// Sorted linear list ([`ListQueue`]).
    List,
    /// Array-based binary min-heap ([`BinaryHeapQueue`]).
    BinaryHeap,
    /// Ordered map ([`MapQueue`]).
    #[default]
    Map,
    /// Self-tuning calendar queue ([`CalendarQueue`]).
    Calendar,
    /// ns-2 style calendar queue ([`Ns2CalendarQueue`]).
    Ns2Calendar,
}

/// A time-ordered event queue with an interchangeable discipline.
///
/// All operations dispatch to the discipline chosen at construction. The
/// payload type `V` is arbitrary; simulations store their event callbacks
/// in it.
pub enum EventQueue<V> {
    /// Sorted linear list.
    List(ListQueue<V>),
    /// Binary min-heap.
    BinaryHeap(BinaryHeapQueue<V>),
    /// Ordered map.
    Map(MapQueue<V>),
    /// Self-tuning calendar queue.
    Calendar(CalendarQueue<V>),
    /// ns-2 style calendar queue.
    Ns2Calendar(Ns2CalendarQueue<V>),
}

impl<V> EventQueue<V> {
    /// Creates an empty queue with the provided discipline.
    pub fn new(discipline: QueueDiscipline) -> Self {
        match discipline {
            QueueDiscipline::List => Self::List(ListQueue::new()),
            QueueDiscipline::BinaryHeap => Self::BinaryHeap(BinaryHeapQueue::new()),
            QueueDiscipline::Map => Self::Map(MapQueue::new()),
            QueueDiscipline::Calendar => Self::Calendar(CalendarQueue::new()),
            QueueDiscipline::Ns2Calendar => Self::Ns2Calendar(Ns2CalendarQueue::new()),
        }
    }

    /// Returns the number of enqueued events.
    pub fn len(&self) -> usize {
        match self {
            Self::List(q) => q.len(),
            Self::BinaryHeap(q) => q.len(),
            Self::Map(q) => q.len(),
            Self::Calendar(q) => q.len(),
            Self::Ns2Calendar(q) => q.len(),
        }
    }

    /// Checks whether the queue holds no event.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(q) => q.is_empty(),
            Self::BinaryHeap(q) => q.is_empty(),
            Self::Map(q) => q.is_empty(),
            Self::Calendar(q) => q.is_empty(),
            Self::Ns2Calendar(q) => q.is_empty(),
        }
    }

    /// Inserts an event record.
    pub fn insert(&mut self, event: ScheduledEvent<V>) {
        match self {
            Self::List(q) => q.insert(event),
            Self::BinaryHeap(q) => q.insert(event),
            Self::Map(q) => q.insert(event),
            Self::Calendar(q) => q.insert(event),
            Self::Ns2Calendar(q) => q.insert(event),
        }
    }

    /// Returns the key of the next event without removing it, or `None` if
    /// the queue is empty.
    pub fn peek_next(&self) -> Option<EventKey> {
        match self {
            Self::List(q) => q.peek_next(),
            Self::BinaryHeap(q) => q.peek_next(),
            Self::Map(q) => q.peek_next(),
            Self::Calendar(q) => q.peek_next(),
            Self::Ns2Calendar(q) => q.peek_next(),
        }
    }

    /// Removes and returns the event with the minimum key, or `None` if the
    /// queue is empty.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent<V>> {
        match self {
            Self::List(q) => q.pop_next(),
            Self::BinaryHeap(q) => q.pop_next(),
            Self::Map(q) => q.pop_next(),
            Self::Calendar(q) => q.pop_next(),
            Self::Ns2Calendar(q) => q.pop_next(),
        }
    }

    /// Removes and returns the event with the provided key.
    ///
    /// Returns `None` if no such record is enqueued; callers for which the
    /// record must be present treat that as a fatal consistency error.
    pub fn remove(&mut self, key: EventKey) -> Option<ScheduledEvent<V>> {
        match self {
            Self::List(q) => q.remove(key),
            Self::BinaryHeap(q) => q.remove(key),
            Self::Map(q) => q.remove(key),
            Self::Calendar(q) => q.remove(key),
            Self::Ns2Calendar(q) => q.remove(key),
        }
    }
}

impl<V> fmt::Debug for EventQueue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(q) => fmt::Debug::fmt(q, f),
            Self::BinaryHeap(q) => fmt::Debug::fmt(q, f),
            Self::Map(q) => fmt::Debug::fmt(q, f),
            Self::Calendar(q) => fmt::Debug::fmt(q, f),
            Self::Ns2Calendar(q) => fmt::Debug::fmt(q, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::time::SimTime;
    use crate::util::rng::Rng;

    const DISCIPLINES: [QueueDiscipline; 5] = [
        QueueDiscipline::List,
        QueueDiscipline::BinaryHeap,
        QueueDiscipline::Map,
        QueueDiscipline::Calendar,
        QueueDiscipline::Ns2Calendar,
    ];

    fn key(time: u64, uid: u64) -> EventKey {
        EventKey {
            time: SimTime::from_ticks(time),
            uid,
        }
    }

    #[test]
    fn dequeue_order_with_fifo_ties() {
        // Insertion order [10, 5, 5, 20] must drain as [5, 5, 10, 20] with
        // the two same-instant events in insertion order.
        for discipline in DISCIPLINES {
            let mut queue = EventQueue::new(discipline);
            for (uid, time) in [(3u64, 10u64), (4, 5), (5, 5), (6, 20)] {
                queue.insert(ScheduledEvent::new(key(time, uid), uid).0);
            }

            let mut order = Vec::new();
            while let Some(event) = queue.pop_next() {
                order.push(event.key());
            }
            assert_eq!(
                order,
                [key(5, 4), key(5, 5), key(10, 3), key(20, 6)],
                "wrong dequeue order for {:?}",
                discipline
            );
        }
    }

    #[test]
    fn round_trip_multiset() {
        for discipline in DISCIPLINES {
            let mut queue = EventQueue::new(discipline);
            let keys: Vec<_> = (0..100u64).map(|uid| key(uid * 13 % 47, uid)).collect();

            for &k in &keys {
                queue.insert(ScheduledEvent::new(k, k.uid).0);
            }
            assert_eq!(queue.len(), keys.len());

            let mut drained = Vec::new();
            while let Some(event) = queue.pop_next() {
                drained.push(event.key());
            }
            assert!(queue.is_empty());

            let mut expected = keys.clone();
            expected.sort();
            assert_eq!(drained, expected, "wrong drain for {:?}", discipline);
        }
    }

    #[test]
    fn remove_specific_events() {
        for discipline in DISCIPLINES {
            let mut queue = EventQueue::new(discipline);
            for uid in 0..20u64 {
                queue.insert(ScheduledEvent::new(key(uid * 3, uid), uid).0);
            }

            assert!(queue.remove(key(9, 3)).is_some());
            assert!(queue.remove(key(9, 3)).is_none());
            assert!(queue.remove(key(10, 3)).is_none());

            let mut drained = Vec::new();
            while let Some(event) = queue.pop_next() {
                drained.push(event.key().uid);
            }
            let expected: Vec<_> = (0..20u64).filter(|&uid| uid != 3).collect();
            assert_eq!(drained, expected, "wrong drain for {:?}", discipline);
        }
    }

    #[test]
    fn cross_discipline_equivalence() {
        // All disciplines must produce the identical interleaved
        // insert/pop outcome on the same pseudo-random input.
        let mut queues: Vec<_> = DISCIPLINES.iter().map(|&d| EventQueue::new(d)).collect();

        let rng = Rng::new(7);
        let mut uid = 0u64;
        let mut floor = 0u64; // last popped time: inserts may not precede it

        for _ in 0..5_000 {
            if rng.gen_bounded(3) < 2 {
                let k = key(floor + rng.gen_bounded(1_000), uid);
                uid += 1;
                for queue in &mut queues {
                    queue.insert(ScheduledEvent::new(k, k.uid).0);
                }
            } else {
                let keys: Vec<_> = queues
                    .iter_mut()
                    .map(|queue| queue.pop_next().map(|event| event.key()))
                    .collect();
                for k in &keys[1..] {
                    assert_eq!(*k, keys[0]);
                }
                if let Some(k) = keys[0] {
                    floor = k.time.ticks();
                }
            }
        }
    }

    #[test]
    fn differential_fuzz_against_shadow_map() {
        // Every discipline is checked against a shadow `BTreeMap`: any
        // mismatch in pop or remove outcomes triggers a panic.
        const ITER: usize = 20_000;

        for discipline in DISCIPLINES {
            let rng = Rng::new(987_654_321);
            let mut queue = EventQueue::new(discipline);
            let mut shadow = BTreeMap::new();
            let mut uid = 0u64;
            let mut floor = 0u64;
            let mut removable: Option<EventKey> = None;

            for _ in 0..ITER {
                let op = rng.gen_bounded(8);
                if op < 4 {
                    let k = key(floor + rng.gen_bounded(200), uid);
                    uid += 1;
                    queue.insert(ScheduledEvent::new(k, k.uid).0);
                    shadow.insert(k, k.uid);
                    if op == 0 {
                        removable = Some(k);
                    }
                } else if op < 7 {
                    let popped = queue.pop_next().map(|event| event.key());
                    let expected = shadow.keys().next().copied();
                    if let Some(k) = expected {
                        shadow.remove(&k);
                        floor = k.time.ticks();
                    }
                    assert_eq!(popped, expected, "mismatch for {:?}", discipline);
                } else if let Some(k) = removable.take() {
                    let removed = queue.remove(k).is_some();
                    let expected = shadow.remove(&k).is_some();
                    assert_eq!(removed, expected, "mismatch for {:?}", discipline);
                }
            }

            assert_eq!(queue.len(), shadow.len(), "length drift for {:?}", discipline);
        }
    }

    #[test]
    fn calendar_growth_matches_list_reference() {
        // 1000 events uniformly spread over [0, 1000) force the calendar
        // queue to grow from its initial buckets; the drain order must match
        // the list reference exactly.
        let mut calendar = CalendarQueue::with_buckets(4);
        let mut reference = ListQueue::new();

        let rng = Rng::new(42);
        for uid in 0..1_000u64 {
            let k = key(rng.gen_bounded(1_000), uid);
            calendar.insert(ScheduledEvent::new(k, k.uid).0);
            reference.insert(ScheduledEvent::new(k, k.uid).0);
        }
        assert!(calendar.bucket_count() > 4, "no resize was triggered");

        while let Some(expected) = reference.pop_next() {
            let got = calendar.pop_next().expect("calendar drained early");
            assert_eq!(got.key(), expected.key());
        }
        assert!(calendar.is_empty());
    }
}
