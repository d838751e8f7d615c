// Licensed under the Apache-2.0 license

//! Monotonic time and deadlines.
//!
//! Register polling in the drivers is bounded by wall-clock deadlines rather
//! than loop counts, so the bound does not depend on the CPU frequency.

use fugit::{MicrosDurationU32, MillisDurationU32};

/// Instant with microsecond resolution.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Microsecond duration matching [`Instant`].
pub type Duration = fugit::TimerDurationU64<1_000_000>;

/// Free-running, never decreasing time source.
pub trait Monotonic {
    fn now(&self) -> Instant;
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Point in time after which a bounded wait gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after<C: Monotonic + ?Sized>(clock: &C, timeout: Duration) -> Self {
        Self {
            at: clock.now() + timeout,
        }
    }

    #[must_use]
    pub fn after_micros<C: Monotonic + ?Sized>(clock: &C, timeout: MicrosDurationU32) -> Self {
        Self::after(clock, Duration::micros(u64::from(timeout.ticks())))
    }

    #[must_use]
    pub fn after_millis<C: Monotonic + ?Sized>(clock: &C, timeout: MillisDurationU32) -> Self {
        Self::after(clock, Duration::millis(u64::from(timeout.ticks())))
    }

    #[must_use]
    pub fn expired<C: Monotonic + ?Sized>(&self, clock: &C) -> bool {
        clock.now() >= self.at
    }
}
