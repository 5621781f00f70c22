//! Discrete-event simulation management.
//!
//! This module contains the [`Simulation`] environment and the [`SimInit`]
//! simulation builder.
//!
//! # Simulation lifecycle
//!
//! The lifecycle of a simulation typically comprises the following stages:
//!
//! 1. instantiation of a [`SimInit`] builder and selection of the queue
//!    discipline with [`SimInit::set_queue()`],
//! 2. initialization of a [`Simulation`] with [`SimInit::init()`],
//! 3. scheduling of the initial events with [`Simulation::schedule()`] and
//!    its sibling methods,
//! 4. execution with [`Simulation::run()`] or [`Simulation::step()`],
//!    during which event callbacks may themselves schedule further events,
//! 5. teardown with [`Simulation::destroy()`], which fires the callbacks
//!    deferred with [`Simulation::schedule_destroy()`] and releases all
//!    remaining events uninvoked.
//!
//! A `Simulation` is an explicit, self-contained object: several independent
//! simulations can coexist in one process, each with its own timeline, event
//! queue and uid sequence.
//!
//! # Event ordering
//!
//! Events fire in strict `(time, uid)` order. Since uids increase
//! monotonically with each `schedule*` call, same-instant events fire in the
//! order they were scheduled, and an event scheduled with a zero delay from
//! within a callback executing at time `T` fires after all events already
//! due at `T` but before any event due later.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use eventick::simulation::SimInit;
//! use eventick::queue::QueueDiscipline;
//!
//! let mut simu = SimInit::new().set_queue(QueueDiscipline::BinaryHeap).init();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let a = log.clone();
//! simu.schedule(Duration::from_secs(2), move |_| a.borrow_mut().push("b"));
//! let b = log.clone();
//! simu.schedule(Duration::from_secs(1), move |simu| {
//!     b.borrow_mut().push("a");
//!     let c = b.clone();
//!     // Re-entrant scheduling: fires one second later.
//!     simu.schedule(Duration::from_secs(2), move |_| c.borrow_mut().push("c"));
//! });
//!
//! simu.run();
//!
//! assert_eq!(*log.borrow(), ["a", "b", "c"]);
//! assert_eq!(simu.time().duration_since(Default::default()), Duration::from_secs(3));
//! ```

mod sim_init;

pub use sim_init::SimInit;

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::event::{EventId, EventKey, ScheduledEvent, UID_DESTROY, UID_FIRST, UID_INVALID};
use crate::queue::{EventQueue, QueueDiscipline};
use crate::time::SimTime;

/// The type of the callbacks driven by a [`Simulation`].
///
/// Callbacks receive the simulation itself, so they can schedule further
/// events, request a stop or query the clock.
pub type EventFn = Box<dyn FnOnce(&mut Simulation)>;

/// Simulation environment.
///
/// A `Simulation` owns an event queue, the simulation clock and the list of
/// destroy-time callbacks. It is created by calling
/// [`SimInit::init()`](SimInit::init) on a simulation builder.
///
/// See the [module documentation](self) for a description of the lifecycle
/// and of the event ordering guarantees.
pub struct Simulation {
    queue: EventQueue<EventFn>,
    time: SimTime,
    current_uid: u64,
    next_uid: u64,
    /// Events inserted in the queue and neither fired nor removed yet.
    /// Redundant with the queue length on purpose: a mismatch at natural
    /// exhaustion reveals a record leaked or duplicated by the queue.
    outstanding: i64,
    stop_requested: bool,
    stop_at: Option<SimTime>,
    destroy_events: VecDeque<ScheduledEvent<EventFn>>,
    next_destroy_seq: u64,
}

impl Simulation {
    /// Creates a new `Simulation` starting at the provided time.
    pub(crate) fn new(discipline: QueueDiscipline, start: SimTime) -> Self {
        Self {
            queue: EventQueue::new(discipline),
            time: start,
            current_uid: UID_INVALID,
            next_uid: UID_FIRST,
            outstanding: 0,
            stop_requested: false,
            stop_at: None,
            destroy_events: VecDeque::new(),
            next_destroy_seq: 0,
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Checks whether any event is waiting in the queue.
    pub fn events_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Returns the due time of the next queued event, if any.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek_next().map(|key| key.time)
    }

    /// Schedules an event at the lapse of the specified delay.
    pub fn schedule<F>(&mut self, delay: Duration, f: F) -> EventId
    where
        F: FnOnce(&mut Simulation) + 'static,
    {
        let time = self.time + delay;

        self.insert_event(time, Box::new(f))
    }

    /// Schedules an event at an absolute simulation time.
    ///
    /// # Panics
    ///
    /// Panics if the time lies in the past of the current simulation time.
    pub fn schedule_at<F>(&mut self, time: SimTime, f: F) -> EventId
    where
        F: FnOnce(&mut Simulation) + 'static,
    {
        assert!(
            time >= self.time,
            "cannot schedule an event at {}, before the current simulation time {}",
            time,
            self.time
        );

        self.insert_event(time, Box::new(f))
    }

    /// Schedules an event at the current simulation time.
    ///
    /// The event fires after all events already due at this instant but
    /// before any event due later; several "now" events fire in the order
    /// they were scheduled.
    pub fn schedule_now<F>(&mut self, f: F) -> EventId
    where
        F: FnOnce(&mut Simulation) + 'static,
    {
        self.insert_event(self.time, Box::new(f))
    }

    /// Defers a callback to the simulation teardown.
    ///
    /// Destroy-time callbacks never enter the event queue: they fire only
    /// when [`destroy()`](Simulation::destroy) is called, in the order they
    /// were registered, irrespective of simulation time.
    pub fn schedule_destroy<F>(&mut self, f: F) -> EventId
    where
        F: FnOnce(&mut Simulation) + 'static,
    {
        let key = EventKey {
            time: SimTime::from_ticks(self.next_destroy_seq),
            uid: UID_DESTROY,
        };
        self.next_destroy_seq += 1;

        let (event, id) = ScheduledEvent::new(key, Box::new(f) as EventFn);
        self.destroy_events.push_back(event);

        id
    }

    /// Requests the run loop to return before processing any further event.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }

    /// Sets an absolute time at which the run loop stops.
    ///
    /// Events due strictly before the stop time are still processed; the
    /// clock then advances exactly to the stop time. Already-queued events
    /// are not cancelled.
    ///
    /// # Panics
    ///
    /// Panics if the time lies in the past of the current simulation time.
    pub fn stop_at(&mut self, time: SimTime) {
        assert!(
            time >= self.time,
            "cannot stop at {}, before the current simulation time {}",
            time,
            self.time
        );

        self.stop_at = Some(time);
    }

    /// Cancels the event referred to by the id.
    ///
    /// The record stays in the queue until its natural dequeue time, at
    /// which point its callback is skipped. Cancelling an already fired or
    /// cancelled event has no effect.
    pub fn cancel(&self, id: &EventId) {
        id.cancel();
    }

    /// Removes the event referred to by the id from the queue entirely.
    ///
    /// Removing an expired id is a no-op; removing a pending destroy-time id
    /// pulls it from the destroy list.
    ///
    /// # Panics
    ///
    /// Panics if a live, pending id cannot be located in the queue, which
    /// indicates a queue consistency bug.
    pub fn remove(&mut self, id: &EventId) {
        let key = id.key();

        if key.uid == UID_DESTROY {
            if let Some(idx) = self.destroy_events.iter().position(|e| e.key() == key) {
                self.destroy_events.remove(idx);
            }
            return;
        }
        if self.is_expired(id) {
            return;
        }

        self.queue
            .remove(key)
            .expect("a pending event could not be located in the queue");
        id.cancel();
        self.outstanding -= 1;
    }

    /// Checks whether the event referred to by the id already fired, was
    /// cancelled or removed.
    ///
    /// This is a normal, expected outcome and the only way to probe an id's
    /// status; expired ids can be passed to any method of this API safely.
    pub fn is_expired(&self, id: &EventId) -> bool {
        let key = id.key();

        if key.uid == UID_INVALID {
            return true;
        }
        if key.uid == UID_DESTROY {
            return !self.destroy_events.iter().any(|e| e.key() == key);
        }
        if id.state().is_cancelled() || id.state().is_processed() {
            return true;
        }

        key <= EventKey {
            time: self.time,
            uid: self.current_uid,
        }
    }

    /// Returns the simulated time left until the event referred to by the
    /// id is due, or zero if it is expired.
    pub fn delay_left(&self, id: &EventId) -> Duration {
        if self.is_expired(id) {
            return Duration::ZERO;
        }

        id.time().duration_since(self.time)
    }

    /// Processes events until the queue is exhausted, a stop is requested or
    /// the stop time is reached.
    ///
    /// # Panics
    ///
    /// Panics if the queue yields an event dated before the current
    /// simulation time, or if the outstanding-event count does not drop to
    /// zero when the queue is naturally exhausted; both indicate a
    /// scheduler consistency bug.
    pub fn run(&mut self) {
        self.stop_requested = false;

        #[cfg(feature = "tracing")]
        tracing::debug!(time = %self.time, "simulation run started");

        loop {
            if self.stop_requested {
                break;
            }
            let Some(next) = self.queue.peek_next() else {
                break;
            };
            if let Some(stop_at) = self.stop_at {
                if next.time >= stop_at {
                    self.time = stop_at;
                    break;
                }
            }
            self.process_next();
        }

        if self.queue.is_empty() {
            assert_eq!(
                self.outstanding, 0,
                "{} event(s) leaked by the queue at end of run",
                self.outstanding
            );
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(time = %self.time, "simulation run finished");
    }

    /// Processes the next queued event, if any.
    ///
    /// Returns `true` if an event was dequeued. Cancelled events are
    /// dequeued and counted but their callback is skipped.
    pub fn step(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.process_next();

        true
    }

    /// Fires the destroy-time callbacks in registration order, then
    /// releases all remaining queued events uninvoked.
    pub fn destroy(&mut self) {
        while let Some(event) = self.destroy_events.pop_front() {
            if let Some(f) = event.claim() {
                f(self);
            }
        }

        while let Some(event) = self.queue.pop_next() {
            self.outstanding -= 1;
            drop(event);
        }
        assert_eq!(
            self.outstanding, 0,
            "{} event(s) leaked by the queue at teardown",
            self.outstanding
        );
    }

    fn insert_event(&mut self, time: SimTime, f: EventFn) -> EventId {
        let uid = self.next_uid;
        assert_ne!(uid, u64::MAX, "uid sequence exhausted");
        self.next_uid += 1;

        let key = EventKey { time, uid };
        let (event, id) = ScheduledEvent::new(key, f);
        self.queue.insert(event);
        self.outstanding += 1;

        id
    }

    fn process_next(&mut self) {
        let event = self
            .queue
            .pop_next()
            .expect("process_next called on an empty queue");
        let key = event.key();

        assert!(
            key.time >= self.time,
            "queue ordering violated: event dated {} dequeued after the clock reached {}",
            key.time,
            self.time
        );

        self.outstanding -= 1;
        self.time = key.time;
        self.current_uid = key.uid;

        if let Some(f) = event.claim() {
            f(self);
        }
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.time)
            .field("queue", &self.queue)
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}
