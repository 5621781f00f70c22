//! Real-time simulation management.
//!
//! A real-time simulation delivers events in the same strict `(time, uid)`
//! order as a regular [`Simulation`](crate::simulation::Simulation), but
//! paces each dequeue so that it happens when the wall clock reaches the
//! event's due time, as observed through a [`Synchronizer`].
//!
//! Contrary to the single-threaded simulation, events can be scheduled from
//! arbitrary threads through cloneable [`RealtimeScheduler`] handles. All
//! shared state is serialized by a single mutex held only for short critical
//! sections; the pacing wait itself happens outside the mutex, so producers
//! are never blocked by a sleeping loop. Every scheduling call interrupts an
//! in-progress wait, forcing the loop to re-evaluate which event is due
//! next.
//!
//! The loop does not return when the queue runs empty: it blocks until a
//! producer schedules something or a stop is requested. For this reason
//! [`RealtimeScheduler::stop_at()`] schedules a real placeholder event at
//! the stop time, guaranteeing the sleeping loop a wake-up point.
//!
//! Event callbacks run on the loop thread with the mutex released.
//! Re-entrant scheduling from a callback therefore goes through the handle
//! and takes the mutex like any other producer; the mutex is not reentrant,
//! but no path holds it while running user code.
//!
//! # Pacing policies
//!
//! * [`SyncPolicy::BestEffort`]: wall-clock lag is tolerated silently; the
//!   delivery order remains correct even when delivery is late.
//! * [`SyncPolicy::HardLimit`]: when an event is dequeued more than the
//!   configured jitter bound past its due time, the simulation cannot honor
//!   its real-time contract anymore and panics.
//!
//! # Examples
//!
//! A deterministic real-time run, paced by an [`ImmediateSynchronizer`]:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use eventick::queue::QueueDiscipline;
//! use eventick::realtime::RealtimeSimInit;
//! use eventick::time::{ImmediateSynchronizer, SimTime};
//!
//! let mut simu = RealtimeSimInit::new()
//!     .set_queue(QueueDiscipline::Calendar)
//!     .set_synchronizer(ImmediateSynchronizer::new())
//!     .init();
//! let scheduler = simu.scheduler();
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let a = log.clone();
//! scheduler.schedule(Duration::from_millis(5), move |_| a.lock().unwrap().push(5));
//! let b = log.clone();
//! scheduler.schedule(Duration::from_millis(1), move |_| b.lock().unwrap().push(1));
//! scheduler.stop_at(SimTime::ZERO + Duration::from_millis(10));
//!
//! simu.run();
//!
//! assert_eq!(*log.lock().unwrap(), [1, 5]);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::event::{EventId, EventKey, ScheduledEvent, UID_DESTROY, UID_FIRST, UID_INVALID};
use crate::queue::{EventQueue, QueueDiscipline};
use crate::time::{
    monotonic_from_sim, sim_from_monotonic, SimTime, Synchronizer, WaitOutcome,
    WallClockSynchronizer,
};

/// The type of the callbacks driven by a [`RealtimeSimulation`].
///
/// Callbacks receive a scheduler handle, so they can schedule further
/// events or request a stop; they may cross threads and must therefore be
/// `Send`.
pub type RtEventFn = Box<dyn FnOnce(&RealtimeScheduler) + Send>;

/// The wall-clock pacing policy of a real-time simulation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Drift between wall-clock and simulation time is tolerated silently.
    #[default]
    BestEffort,
    /// Dequeuing an event later than its due time by more than the bound is
    /// a fatal condition.
    HardLimit(Duration),
}

/// State shared between the loop and the scheduler handles, behind the
/// simulation mutex.
struct RtCore {
    queue: EventQueue<RtEventFn>,
    time: SimTime,
    current_uid: u64,
    next_uid: u64,
    /// See `Simulation::outstanding`.
    outstanding: i64,
    stop_requested: bool,
    destroy_events: VecDeque<ScheduledEvent<RtEventFn>>,
    next_destroy_seq: u64,
}

impl RtCore {
    fn new(discipline: QueueDiscipline, start: SimTime) -> Self {
        Self {
            queue: EventQueue::new(discipline),
            time: start,
            current_uid: UID_INVALID,
            next_uid: UID_FIRST,
            outstanding: 0,
            stop_requested: false,
            destroy_events: VecDeque::new(),
            next_destroy_seq: 0,
        }
    }

    fn insert_event(&mut self, time: SimTime, f: RtEventFn) -> EventId {
        let uid = self.next_uid;
        assert_ne!(uid, u64::MAX, "uid sequence exhausted");
        self.next_uid += 1;

        let key = EventKey { time, uid };
        let (event, id) = ScheduledEvent::new(key, f);
        self.queue.insert(event);
        self.outstanding += 1;

        id
    }

    fn is_expired(&self, id: &EventId) -> bool {
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
}

/// Thread-safe scheduling handle to a [`RealtimeSimulation`].
///
/// Handles are cheap to clone and can be moved to any thread, including the
/// loop thread itself (callbacks receive one). Every mutation of the event
/// set interrupts the loop's pacing wait so the next due event is always
/// re-evaluated.
#[derive(Clone)]
pub struct RealtimeScheduler {
    core: Arc<Mutex<RtCore>>,
    synchronizer: Arc<dyn Synchronizer>,
}

impl RealtimeScheduler {
    /// Returns the current simulation time.
    pub fn time(&self) -> SimTime {
        self.core.lock().unwrap().time
    }

    /// Schedules an event at the lapse of the specified delay, relative to
    /// the current simulation time.
    pub fn schedule<F>(&self, delay: Duration, f: F) -> EventId
    where
        F: FnOnce(&RealtimeScheduler) + Send + 'static,
    {
        let id = {
            let mut core = self.core.lock().unwrap();
            let time = core.time + delay;
            core.insert_event(time, Box::new(f))
        };
        self.synchronizer.signal();

        id
    }

    /// Schedules an event at an absolute simulation time.
    ///
    /// # Panics
    ///
    /// Panics if the time lies in the past of the current simulation time.
    pub fn schedule_at<F>(&self, time: SimTime, f: F) -> EventId
    where
        F: FnOnce(&RealtimeScheduler) + Send + 'static,
    {
        let id = {
            let mut core = self.core.lock().unwrap();
            assert!(
                time >= core.time,
                "cannot schedule an event at {}, before the current simulation time {}",
                time,
                core.time
            );
            core.insert_event(time, Box::new(f))
        };
        self.synchronizer.signal();

        id
    }

    /// Schedules an event at the current wall-clock time.
    ///
    /// Contrary to [`Simulation::schedule_now()`], the event is stamped with
    /// the wall-clock "now" rather than with the last processed simulation
    /// time: a producer thread may be far ahead, in wall-clock terms, of the
    /// event the loop last processed. The timestamp is clamped so it never
    /// precedes the current simulation time.
    ///
    /// [`Simulation::schedule_now()`]: crate::simulation::Simulation::schedule_now
    pub fn schedule_now<F>(&self, f: F) -> EventId
    where
        F: FnOnce(&RealtimeScheduler) + Send + 'static,
    {
        let wall_now = sim_from_monotonic(self.synchronizer.now());
        let id = {
            let mut core = self.core.lock().unwrap();
            let time = wall_now.max(core.time);
            core.insert_event(time, Box::new(f))
        };
        self.synchronizer.signal();

        id
    }

    /// Defers a callback to the simulation teardown; see
    /// [`Simulation::schedule_destroy()`].
    ///
    /// [`Simulation::schedule_destroy()`]: crate::simulation::Simulation::schedule_destroy
    pub fn schedule_destroy<F>(&self, f: F) -> EventId
    where
        F: FnOnce(&RealtimeScheduler) + Send + 'static,
    {
        let mut core = self.core.lock().unwrap();
        let key = EventKey {
            time: SimTime::from_ticks(core.next_destroy_seq),
            uid: UID_DESTROY,
        };
        core.next_destroy_seq += 1;

        let (event, id) = ScheduledEvent::new(key, Box::new(f) as RtEventFn);
        core.destroy_events.push_back(event);

        id
    }

    /// Requests the run loop to return before processing any further event.
    pub fn stop(&self) {
        self.core.lock().unwrap().stop_requested = true;
        self.synchronizer.signal();
    }

    /// Schedules a stop at an absolute simulation time.
    ///
    /// A real no-op placeholder event is inserted at the stop time so the
    /// loop has something to wake up for even if nothing else is scheduled
    /// before then. The returned id refers to the placeholder and can be
    /// removed to rescind the stop.
    ///
    /// # Panics
    ///
    /// Panics if the time lies in the past of the current simulation time.
    pub fn stop_at(&self, time: SimTime) -> EventId {
        self.schedule_at(time, |scheduler: &RealtimeScheduler| scheduler.stop())
    }

    /// Cancels the event referred to by the id; see
    /// [`Simulation::cancel()`].
    ///
    /// [`Simulation::cancel()`]: crate::simulation::Simulation::cancel
    pub fn cancel(&self, id: &EventId) {
        id.cancel();
    }

    /// Removes the event referred to by the id from the queue entirely; see
    /// [`Simulation::remove()`].
    ///
    /// # Panics
    ///
    /// Panics if a live, pending id cannot be located in the queue, which
    /// indicates a queue consistency bug.
    ///
    /// [`Simulation::remove()`]: crate::simulation::Simulation::remove
    pub fn remove(&self, id: &EventId) {
        let key = id.key();
        let mut core = self.core.lock().unwrap();

        if key.uid == UID_DESTROY {
            if let Some(idx) = core.destroy_events.iter().position(|e| e.key() == key) {
                core.destroy_events.remove(idx);
            }
            return;
        }
        if core.is_expired(id) {
            return;
        }

        core.queue
            .remove(key)
            .expect("a pending event could not be located in the queue");
        id.cancel();
        core.outstanding -= 1;
        drop(core);

        // The removed event may be the one the loop is waiting for.
        self.synchronizer.signal();
    }

    /// Checks whether the event referred to by the id already fired, was
    /// cancelled or removed.
    pub fn is_expired(&self, id: &EventId) -> bool {
        self.core.lock().unwrap().is_expired(id)
    }

    /// Returns the simulated time left until the event referred to by the
    /// id is due, or zero if it is expired.
    pub fn delay_left(&self, id: &EventId) -> Duration {
        let core = self.core.lock().unwrap();
        if core.is_expired(id) {
            return Duration::ZERO;
        }

        id.time().duration_since(core.time)
    }
}

impl fmt::Debug for RealtimeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeScheduler").finish_non_exhaustive()
    }
}

/// What the loop decided to do after inspecting the shared state.
enum Step {
    Stop,
    Idle,
    Wait(EventKey),
}

/// Real-time simulation environment.
///
/// Created by calling [`RealtimeSimInit::init()`] on a simulation builder;
/// see the [module documentation](self) for the pacing protocol.
pub struct RealtimeSimulation {
    scheduler: RealtimeScheduler,
    policy: SyncPolicy,
}

impl RealtimeSimulation {
    fn new(
        discipline: QueueDiscipline,
        policy: SyncPolicy,
        start: SimTime,
        synchronizer: Arc<dyn Synchronizer>,
    ) -> Self {
        Self {
            scheduler: RealtimeScheduler {
                core: Arc::new(Mutex::new(RtCore::new(discipline, start))),
                synchronizer,
            },
            policy,
        }
    }

    /// Returns a scheduling handle that can be cloned and moved to producer
    /// threads.
    pub fn scheduler(&self) -> RealtimeScheduler {
        self.scheduler.clone()
    }

    /// Processes events as their wall-clock due time is reached, until a
    /// stop is requested.
    ///
    /// When the queue is empty the loop blocks until a producer schedules an
    /// event; it returns only through [`RealtimeScheduler::stop()`] or a
    /// [`RealtimeScheduler::stop_at()`] placeholder.
    ///
    /// # Panics
    ///
    /// Panics if an event is dequeued later than its due time by more than
    /// the configured [`SyncPolicy::HardLimit`] bound, or on the same
    /// queue-consistency violations as
    /// [`Simulation::run()`](crate::simulation::Simulation::run).
    pub fn run(&mut self) {
        loop {
            match self.next_step() {
                Step::Stop => break,
                Step::Idle => self.scheduler.synchronizer.wait(),
                Step::Wait(key) => {
                    let deadline = monotonic_from_sim(key.time);
                    if let WaitOutcome::Interrupted =
                        self.scheduler.synchronizer.wait_until(deadline)
                    {
                        // A producer changed the event set; re-evaluate
                        // which event is due next.
                        continue;
                    }
                    self.process_due(key);
                }
            }
        }
    }

    /// Fires the destroy-time callbacks in registration order, then
    /// releases all remaining queued events uninvoked.
    pub fn destroy(&mut self) {
        loop {
            let event = self
                .scheduler
                .core
                .lock()
                .unwrap()
                .destroy_events
                .pop_front();
            match event {
                None => break,
                Some(event) => {
                    if let Some(f) = event.claim() {
                        f(&self.scheduler);
                    }
                }
            }
        }

        let mut core = self.scheduler.core.lock().unwrap();
        while let Some(event) = core.queue.pop_next() {
            core.outstanding -= 1;
            drop(event);
        }
        assert_eq!(
            core.outstanding, 0,
            "{} event(s) leaked by the queue at teardown",
            core.outstanding
        );
    }

    fn next_step(&self) -> Step {
        let mut core = self.scheduler.core.lock().unwrap();

        if core.stop_requested {
            core.stop_requested = false;
            return Step::Stop;
        }
        match core.queue.peek_next() {
            Some(key) => Step::Wait(key),
            None => {
                // Natural emptiness: the consistency counter must agree.
                assert_eq!(
                    core.outstanding, 0,
                    "{} event(s) leaked by the queue",
                    core.outstanding
                );
                Step::Idle
            }
        }
    }

    /// Pops and fires the next event once its due time has been reached.
    ///
    /// The event actually popped may differ from the one the wait was
    /// started for: an event inserted meanwhile with an earlier due time is
    /// also due by now and correctly fires first. Conversely, if the awaited
    /// event was removed and the new minimum is due later, nothing is
    /// popped and the loop waits again.
    fn process_due(&mut self, waited: EventKey) {
        let event = {
            let mut core = self.scheduler.core.lock().unwrap();
            if core.stop_requested {
                return;
            }
            match core.queue.peek_next() {
                Some(next) if next.time <= waited.time => {}
                _ => return,
            }
            let event = core
                .queue
                .pop_next()
                .expect("a peeked event vanished from the queue");
            let key = event.key();

            assert!(
                key.time >= core.time,
                "queue ordering violated: event dated {} dequeued after the clock reached {}",
                key.time,
                core.time
            );

            core.outstanding -= 1;
            core.time = key.time;
            core.current_uid = key.uid;

            event
        };

        let due = monotonic_from_sim(event.key().time);
        let now = self.scheduler.synchronizer.now();
        if now > due {
            let lag = now.duration_since(due);
            match self.policy {
                SyncPolicy::HardLimit(limit) if lag > limit => {
                    panic!(
                        "real-time hard limit exceeded: event due at {} fired {:?} late (limit {:?})",
                        event.key().time,
                        lag,
                        limit
                    );
                }
                _ => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(lag = ?lag, "event delivered past its due time");
                }
            }
        }

        if let Some(f) = event.claim() {
            f(&self.scheduler);
        }
    }
}

impl fmt::Debug for RealtimeSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSimulation")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Builder for a real-time simulation.
pub struct RealtimeSimInit {
    discipline: QueueDiscipline,
    policy: SyncPolicy,
    start: SimTime,
    synchronizer: Option<Arc<dyn Synchronizer>>,
}

impl RealtimeSimInit {
    /// Creates a builder with the default queue discipline, the
    /// [`SyncPolicy::BestEffort`] policy, a start time of [`SimTime::ZERO`]
    /// and a wall-clock synchronizer.
    pub fn new() -> Self {
        Self {
            discipline: QueueDiscipline::default(),
            policy: SyncPolicy::default(),
            start: SimTime::ZERO,
            synchronizer: None,
        }
    }

    /// Selects the queue discipline backing the simulation.
    pub fn set_queue(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;

        self
    }

    /// Selects the pacing policy.
    pub fn set_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;

        self
    }

    /// Sets the starting simulation time.
    pub fn set_start(mut self, start: SimTime) -> Self {
        self.start = start;

        self
    }

    /// Substitutes the synchronizer pacing the loop.
    ///
    /// If no synchronizer is explicitly set, a [`WallClockSynchronizer`]
    /// whose timeline starts at [`init()`](RealtimeSimInit::init) time is
    /// used.
    pub fn set_synchronizer(mut self, synchronizer: impl Synchronizer + 'static) -> Self {
        self.synchronizer = Some(Arc::new(synchronizer));

        self
    }

    /// Builds the simulation; with the default synchronizer, the wall-clock
    /// timeline starts now.
    pub fn init(self) -> RealtimeSimulation {
        let synchronizer = self
            .synchronizer
            .unwrap_or_else(|| Arc::new(WallClockSynchronizer::starting_at(self.start)));

        RealtimeSimulation::new(self.discipline, self.policy, self.start, synchronizer)
    }
}

impl Default for RealtimeSimInit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RealtimeSimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSimInit")
            .field("discipline", &self.discipline)
            .field("policy", &self.policy)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}
