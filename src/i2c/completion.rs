// Licensed under the Apache-2.0 license

//! One-shot completion signal between the interrupt path and a blocked
//! caller.

use crate::timer::{Deadline, Monotonic};
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;

/// The deadline passed before the signal fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedOut;

/// Single-producer, single-consumer "transfer finished" flag.
///
/// The interrupt path signals it once per transaction, only after the
/// transfer context holds a terminal result. The waiting caller consumes the
/// signal.
pub struct Completion {
    signalled: AtomicBool,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signalled: AtomicBool::new(false),
        }
    }

    /// Forget any stale signal before arming a new transaction.
    pub fn reset(&self) {
        self.signalled.store(false, Ordering::Release);
    }

    /// Fire the signal. Returns `false` if it was already pending.
    pub fn signal(&self) -> bool {
        self.signalled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Consume the signal if it has fired.
    pub fn poll(&self) -> nb::Result<(), Infallible> {
        match self
            .signalled
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(nb::Error::WouldBlock),
        }
    }

    /// Sleep in `interval` steps until the signal fires or `deadline` passes.
    ///
    /// # Errors
    ///
    /// `TimedOut` if the signal did not fire in time.
    pub fn wait<C, D>(
        &self,
        clock: &C,
        deadline: Deadline,
        delay: &mut D,
        interval: MicrosDurationU32,
    ) -> Result<(), TimedOut>
    where
        C: Monotonic,
        D: DelayNs,
    {
        loop {
            match self.poll() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }
            if deadline.expired(clock) {
                return self.poll().map_err(|_| TimedOut);
            }
            delay.delay_us(interval.ticks());
        }
    }
}
