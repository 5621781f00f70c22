//! A discrete-event simulation scheduler core.
//!
//! Eventick provides the machinery that sits at the heart of a discrete-event
//! simulator: a strictly time-ordered queue of future events, a
//! single-threaded loop that drains it deterministically, and a real-time
//! loop that paces event delivery to the wall clock while accepting
//! insertions from arbitrary threads.
//!
//! # A practical overview
//!
//! Running a simulation involves three distinct activities:
//!
//! 1. choosing a queue discipline, one of the interchangeable
//!    [`queue::QueueDiscipline`] variants, all of which deliver events in
//!    the exact same order and differ only in their complexity profile,
//! 2. scheduling events, that is, callbacks paired with a due time and
//!    identified by an [`event::EventId`] that can be used for cancellation,
//! 3. driving the loop, either as fast as possible with
//!    [`simulation::Simulation::run()`], or paced to the wall clock with
//!    [`realtime::RealtimeSimulation::run()`].
//!
//! Events fire in strict `(time, uid)` order: ties between same-instant
//! events are broken by their scheduling order, so the execution of a
//! simulation is fully deterministic for a given sequence of scheduling
//! calls, whatever the discipline.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use eventick::queue::QueueDiscipline;
//! use eventick::simulation::SimInit;
//!
//! let mut simu = SimInit::new().set_queue(QueueDiscipline::Calendar).init();
//!
//! let fired = Rc::new(RefCell::new(Vec::new()));
//!
//! for delay in [3u64, 1, 2] {
//!     let fired = fired.clone();
//!     simu.schedule(Duration::from_secs(delay), move |_| {
//!         fired.borrow_mut().push(delay);
//!     });
//! }
//!
//! simu.run();
//!
//! assert_eq!(*fired.borrow(), [1, 2, 3]);
//! ```
//!
//! ## Modules documentation
//!
//! * the [`queue`] module describes the queue disciplines and their
//!   complexity trade-offs,
//! * the [`simulation`] module covers the simulation lifecycle, event
//!   ordering and teardown,
//! * the [`realtime`] module covers the wall-clock pacing protocol, the
//!   threading model and the pacing policies,
//! * the [`time`] module discusses the simulated timeline and the
//!   wall-clock synchronizer.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod event;
pub mod queue;
pub mod realtime;
pub mod simulation;
pub mod time;
pub(crate) mod util;
