use std::fmt;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tai_time::{MonotonicClock, MonotonicTime};

use crate::time::{monotonic_from_sim, SimTime};

/// Remaining wait below which the synchronizer stops relying on the OS
/// scheduler and spins for accuracy.
const SPIN_THRESHOLD: Duration = Duration::from_millis(1);

/// The outcome of a blocking wait on a [`Synchronizer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WaitOutcome {
    /// The deadline was reached.
    Completed,
    /// The wait was aborted by a [`signal()`](Synchronizer::signal) before
    /// the deadline was reached.
    Interrupted,
}

/// A wall-clock wait/interrupt primitive used to pace a real-time simulation.
///
/// This trait abstracts over the source of wall-clock time and over the
/// waiting strategy, which makes it possible to substitute a non-blocking
/// implementation in tests.
///
/// A waiting loop thread blocks in [`wait_until()`](Synchronizer::wait_until)
/// or [`wait()`](Synchronizer::wait) while producer threads call
/// [`signal()`](Synchronizer::signal) whenever the set of scheduled events
/// changes. Signals are latched: a signal delivered while no wait is in
/// progress interrupts the next wait.
pub trait Synchronizer: Send + Sync {
    /// Blocks until the wall-clock time corresponding to the deadline, or
    /// until interrupted by a signal, whichever comes first.
    fn wait_until(&self, deadline: MonotonicTime) -> WaitOutcome;

    /// Blocks until signalled.
    fn wait(&self);

    /// Interrupts the wait currently in progress, if any; otherwise latches
    /// the interruption for the next wait.
    fn signal(&self);

    /// Returns the current wall-clock time on the simulation timeline.
    fn now(&self) -> MonotonicTime;
}

impl fmt::Debug for dyn Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer").finish_non_exhaustive()
    }
}

/// Latched signal flag shared between the waiting thread and producers.
#[derive(Debug, Default)]
struct SignalCore {
    signalled: Mutex<bool>,
    unblocked: Condvar,
}

impl SignalCore {
    fn signal(&self) {
        let mut signalled = self.signalled.lock().unwrap();
        *signalled = true;
        self.unblocked.notify_one();
    }

    fn wait(&self) {
        let mut signalled = self.signalled.lock().unwrap();
        while !*signalled {
            signalled = self.unblocked.wait(signalled).unwrap();
        }
        *signalled = false;
    }
}

/// A [`Synchronizer`] based on the system's monotonic clock.
///
/// The simulation timeline is mapped onto the monotonic system clock when the
/// synchronizer is constructed: the provided simulation timestamp corresponds
/// to the wall-clock "now" of the call.
///
/// Waits are served by the OS up to about one millisecond before the deadline
/// and by spin-sleeping from there on, so the achievable accuracy is
/// typically in the microsecond range.
#[derive(Debug)]
pub struct WallClockSynchronizer {
    clock: MonotonicClock,
    core: SignalCore,
}

impl WallClockSynchronizer {
    /// Constructs a synchronizer whose wall-clock timeline starts now at the
    /// provided simulation timestamp.
    pub fn starting_at(start: SimTime) -> Self {
        Self {
            clock: MonotonicClock::init_from_instant(monotonic_from_sim(start), Instant::now()),
            core: SignalCore::default(),
        }
    }
}

impl Synchronizer for WallClockSynchronizer {
    fn wait_until(&self, deadline: MonotonicTime) -> WaitOutcome {
        let mut signalled = self.core.signalled.lock().unwrap();

        loop {
            if *signalled {
                *signalled = false;

                return WaitOutcome::Interrupted;
            }

            let now = self.clock.now();
            if now >= deadline {
                return WaitOutcome::Completed;
            }

            let remaining = deadline.duration_since(now);
            if remaining <= SPIN_THRESHOLD {
                // Signals delivered during the spin tail stay latched and
                // interrupt the next wait instead.
                drop(signalled);
                spin_sleep::sleep(remaining);

                return WaitOutcome::Completed;
            }

            let (guard, _) = self
                .core
                .unblocked
                .wait_timeout(signalled, remaining - SPIN_THRESHOLD)
                .unwrap();
            signalled = guard;
        }
    }

    fn wait(&self) {
        self.core.wait();
    }

    fn signal(&self) {
        self.core.signal();
    }

    fn now(&self) -> MonotonicTime {
        self.clock.now()
    }
}

/// A [`Synchronizer`] that never actually waits.
///
/// Timed waits complete immediately and move an internal wall-clock frontier
/// to the requested deadline, effectively running a real-time simulation as
/// fast as possible while keeping drift at zero. Indefinite waits still block
/// until signalled.
///
/// This synchronizer makes real-time simulations deterministic and is mainly
/// useful for tests.
#[derive(Debug)]
pub struct ImmediateSynchronizer {
    frontier: Mutex<MonotonicTime>,
    core: SignalCore,
}

impl ImmediateSynchronizer {
    /// Constructs a new `ImmediateSynchronizer`.
    pub fn new() -> Self {
        Self {
            frontier: Mutex::new(MonotonicTime::EPOCH),
            core: SignalCore::default(),
        }
    }
}

impl Default for ImmediateSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer for ImmediateSynchronizer {
    fn wait_until(&self, deadline: MonotonicTime) -> WaitOutcome {
        {
            let mut signalled = self.core.signalled.lock().unwrap();
            if *signalled {
                *signalled = false;

                return WaitOutcome::Interrupted;
            }
        }

        let mut frontier = self.frontier.lock().unwrap();
        if *frontier < deadline {
            *frontier = deadline;
        }

        WaitOutcome::Completed
    }

    fn wait(&self) {
        self.core.wait();
    }

    fn signal(&self) {
        self.core.signal();
    }

    fn now(&self) -> MonotonicTime {
        *self.frontier.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn wall_clock_wait_completes_near_deadline() {
        const TOLERANCE: f64 = 0.020; // [s]

        let sync = WallClockSynchronizer::starting_at(SimTime::ZERO);
        let start = Instant::now();
        let deadline = monotonic_from_sim(SimTime::ZERO + Duration::from_millis(50));

        assert_eq!(sync.wait_until(deadline), WaitOutcome::Completed);

        let elapsed = start.elapsed().as_secs_f64();
        assert!(
            (elapsed - 0.050).abs() <= TOLERANCE,
            "expected t = 0.050s +/- {:.3}s, measured t = {:.6}s",
            TOLERANCE,
            elapsed,
        );
    }

    #[test]
    fn wall_clock_wait_is_interruptible() {
        let sync = Arc::new(WallClockSynchronizer::starting_at(SimTime::ZERO));
        let deadline = monotonic_from_sim(SimTime::ZERO + Duration::from_secs(60));

        let signaller = sync.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaller.signal();
        });

        let start = Instant::now();
        assert_eq!(sync.wait_until(deadline), WaitOutcome::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(10));

        handle.join().unwrap();
    }

    #[test]
    fn latched_signal_interrupts_next_wait() {
        let sync = WallClockSynchronizer::starting_at(SimTime::ZERO);
        let deadline = monotonic_from_sim(SimTime::ZERO + Duration::from_secs(60));

        sync.signal();

        assert_eq!(sync.wait_until(deadline), WaitOutcome::Interrupted);
    }

    #[test]
    fn immediate_synchronizer_advances_frontier() {
        let sync = ImmediateSynchronizer::new();
        let deadline = monotonic_from_sim(SimTime::ZERO + Duration::from_secs(3600));

        assert_eq!(sync.wait_until(deadline), WaitOutcome::Completed);
        assert_eq!(sync.now(), deadline);
    }
}
