//! Simulation time and wall-clock synchronization.
//!
//! This module provides most notably:
//!
//! * [`SimTime`]: a timestamp on the simulated timeline, counted in
//!   nanosecond ticks since the start of the simulation epoch,
//! * [`Synchronizer`]: a trait for the wall-clock wait/interrupt primitive
//!   that paces a real-time simulation, implemented for instance by
//!   [`WallClockSynchronizer`] and [`ImmediateSynchronizer`].
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use eventick::time::SimTime;
//!
//! let t = SimTime::ZERO + Duration::from_millis(1500);
//!
//! assert_eq!(t.ticks(), 1_500_000_000);
//! assert_eq!(t.duration_since(SimTime::ZERO), Duration::from_millis(1500));
//! ```

mod clock;

use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use tai_time::MonotonicTime;

pub use clock::{ImmediateSynchronizer, Synchronizer, WaitOutcome, WallClockSynchronizer};

/// A timestamp on the simulated timeline.
///
/// Simulated time is an opaque, monotonically increasing tick count starting
/// at [`SimTime::ZERO`]. One tick corresponds to one nanosecond, which makes
/// the conversion to and from [`Duration`] exact, as well as the mapping to
/// wall-clock timestamps in real-time simulations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime {
    ticks: u64,
}

impl SimTime {
    /// The start of the simulation timeline.
    pub const ZERO: Self = Self { ticks: 0 };

    /// Creates a timestamp from a raw tick count.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self { ticks }
    }

    /// Returns the raw tick count.
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns the duration elapsed since an earlier timestamp.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is in the future of this timestamp.
    pub fn duration_since(&self, earlier: Self) -> Duration {
        assert!(
            earlier.ticks <= self.ticks,
            "{} is not later than {}",
            self,
            earlier
        );

        Duration::from_nanos(self.ticks - earlier.ticks)
    }

    /// Adds a duration, returning `None` on tick-count overflow.
    pub fn checked_add(self, delay: Duration) -> Option<Self> {
        let delay = u64::try_from(delay.as_nanos()).ok()?;

        self.ticks.checked_add(delay).map(Self::from_ticks)
    }
}

impl Add<Duration> for SimTime {
    type Output = Self;

    /// Adds a duration to a timestamp.
    ///
    /// # Panics
    ///
    /// Panics if the resulting tick count overflows.
    fn add(self, delay: Duration) -> Self {
        self.checked_add(delay)
            .expect("overflow when adding duration to simulation time")
    }
}

impl AddAssign<Duration> for SimTime {
    /// Increments a timestamp by a duration.
    ///
    /// # Panics
    ///
    /// Panics if the resulting tick count overflows.
    fn add_assign(&mut self, delay: Duration) {
        *self = *self + delay;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:09}s",
            self.ticks / 1_000_000_000,
            self.ticks % 1_000_000_000
        )
    }
}

/// Maps a simulated timestamp onto the wall-clock timeline.
///
/// The simulation epoch is pinned to `MonotonicTime::EPOCH`, which is what
/// makes the 1 tick = 1 ns mapping exact.
pub(crate) fn monotonic_from_sim(time: SimTime) -> MonotonicTime {
    MonotonicTime::EPOCH + Duration::from_nanos(time.ticks())
}

/// Maps a wall-clock timestamp back onto the simulated timeline.
pub(crate) fn sim_from_monotonic(time: MonotonicTime) -> SimTime {
    SimTime::from_ticks(time.duration_since(MonotonicTime::EPOCH).as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_arithmetic() {
        let t0 = SimTime::ZERO;
        let t1 = t0 + Duration::from_nanos(42);
        let t2 = t1 + Duration::from_secs(1);

        assert_eq!(t1.ticks(), 42);
        assert_eq!(t2.duration_since(t1), Duration::from_secs(1));
        assert!(t1 < t2);
    }

    #[test]
    fn sim_time_checked_add_overflow() {
        let t = SimTime::from_ticks(u64::MAX);

        assert!(t.checked_add(Duration::from_nanos(1)).is_none());
    }

    #[test]
    #[should_panic(expected = "not later")]
    fn sim_time_duration_since_earlier() {
        let t0 = SimTime::ZERO;
        let t1 = t0 + Duration::from_secs(1);

        let _ = t0.duration_since(t1);
    }

    #[test]
    fn sim_time_monotonic_round_trip() {
        let t = SimTime::from_ticks(123_456_789_012);

        assert_eq!(sim_from_monotonic(monotonic_from_sim(t)), t);
    }
}
