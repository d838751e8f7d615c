// Licensed under the Apache-2.0 license

//! One TWI controller instance: transaction submission, interrupt dispatch,
//! bring-up and recovery.
//!
//! The register bank, the transfer context and the logger are shared by
//! callers and the interrupt path. Callers reach them only inside a critical
//! section, so the controller's interrupt cannot preempt a caller halfway
//! through a register sequence; each section is bounded by `poll_timeout`.
//! A second lock serializes callers and owns the delay provider they sleep
//! on, outside any critical section.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{clock_divider, ConfigurationError, Functionality, I2cConfig};
use crate::i2c::completion::Completion;
use crate::i2c::error::Error;
use crate::i2c::hal::TwiHal;
use crate::i2c::message::Message;
use crate::i2c::registers::RegisterBank;
use crate::i2c::transfer::{ControllerState, Step, TransferContext};
use crate::timer::{Deadline, Monotonic};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use fugit::MillisDurationU32;

/// Upper bound on SCL pulses clocked while freeing a stuck SDA.
const RECOVERY_PULSES: u32 = 9;
const RECOVERY_HALF_PERIOD_US: u32 = 1_000;

/// What one call of [`TwiBus::on_interrupt`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqOutcome {
    /// No interrupt pending on this controller. Nothing was touched.
    Spurious,
    /// Called from inside a section that already holds the controller.
    /// Nothing was touched and the line stays asserted.
    Deferred,
    /// Interrupt pending without a transfer in flight. Line disabled.
    Unexpected,
    /// One step handled, the line is re-armed for the next bus event.
    InProgress,
    /// Terminal state reached and the waiting caller signalled.
    Completed,
}

struct Hardware<R, L> {
    regs: R,
    ctx: TransferContext,
    logger: L,
}

impl<R, L: Logger> Hardware<R, L> {
    /// Turn a finished context into the caller's result, copying read data
    /// out only when every message went through.
    fn settle(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        match self.ctx.state() {
            ControllerState::Completed(Err(err)) => Err(err),
            ControllerState::Completed(Ok(())) => {
                let completed = self.ctx.messages_completed();
                if completed == msgs.len() {
                    self.ctx.copy_out(msgs);
                    Ok(completed)
                } else {
                    self.logger.error(format_args!(
                        "only {completed} of {} messages transferred",
                        msgs.len()
                    ));
                    Err(Error::IncompleteTransfer)
                }
            }
            state => {
                self.logger
                    .error(format_args!("woken in non-terminal state {state:?}"));
                Err(Error::LogicError)
            }
        }
    }
}

pub struct TwiBus<R, C, D, L = NoOpLogger>
where
    R: RegisterBank,
    C: Monotonic,
    D: DelayNs,
    L: Logger,
{
    hw: Mutex<RefCell<Hardware<R, L>>>,
    bus_lock: spin::Mutex<D>,
    done: Completion,
    clock: C,
    config: I2cConfig,
}

impl<R, C, D, L> TwiBus<R, C, D, L>
where
    R: RegisterBank,
    C: Monotonic,
    D: DelayNs,
    L: Logger,
{
    pub fn new(regs: R, clock: C, delay: D, logger: L, config: I2cConfig) -> Self {
        Self {
            hw: Mutex::new(RefCell::new(Hardware {
                regs,
                ctx: TransferContext::new(),
                logger,
            })),
            bus_lock: spin::Mutex::new(delay),
            done: Completion::new(),
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    #[must_use]
    pub fn functionality(&self) -> Functionality {
        Functionality::I2C | Functionality::TEN_BIT_ADDR | Functionality::SMBUS_EMUL
    }

    /// Run `f` on the shared state with interrupts masked. Must not nest.
    fn locked<T>(&self, f: impl FnOnce(&mut Hardware<R, L>) -> T) -> T {
        critical_section::with(|cs| f(&mut self.hw.borrow_ref_mut(cs)))
    }

    fn with_hal<T>(&self, f: impl FnOnce(&mut TwiHal<'_, R, C>) -> T) -> T {
        self.locked(|hw| f(&mut TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout)))
    }

    /// Program the bus clock and enable the controller.
    ///
    /// Returns the bus frequency actually produced by the chosen divider.
    ///
    /// # Errors
    ///
    /// A zero frequency, or a target rate no divider can reach.
    pub fn configure(&self, bus_hz: u32, source_clock_hz: u32) -> Result<u32, ConfigurationError> {
        let divider = clock_divider(source_clock_hz, bus_hz)?;
        let actual = divider.bus_frequency(source_clock_hz);
        self.locked(|hw| {
            let mut hal = TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout);
            hal.set_clock(divider);
            hal.enable_bus();
            hw.logger.debug(format_args!(
                "bus clock {actual} Hz (m={}, n={})",
                divider.m, divider.n
            ));
        });
        Ok(actual)
    }

    /// Reset the controller and bring it up at the configured speed.
    ///
    /// # Errors
    ///
    /// See [`Self::configure`].
    pub fn init(&self) -> Result<u32, ConfigurationError> {
        self.reset();
        self.configure(self.config.speed.hz(), self.config.source_clock_hz)
    }

    /// Soft-reset the controller.
    ///
    /// A transfer left in flight by a caller that timed out is abandoned, so
    /// the next submission starts from `Idle`.
    pub fn reset(&self) {
        self.locked(|hw| {
            let mut hal = TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout);
            hal.soft_reset();
            hal.disable_irq();
            if hw.ctx.in_flight() {
                hw.logger.error(format_args!(
                    "reset abandons a transfer after {} messages",
                    hw.ctx.messages_completed()
                ));
            }
            hw.ctx.release();
            self.done.reset();
        });
    }

    /// Interrupt entry point. Must be called whenever the controller's IRQ
    /// line fires; not reentrant for the same bus.
    pub fn on_interrupt(&self) -> IrqOutcome {
        critical_section::with(|cs| {
            let Ok(mut guard) = self.hw.borrow(cs).try_borrow_mut() else {
                return IrqOutcome::Deferred;
            };
            let hw = &mut *guard;
            let mut hal = TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout);
            if !hal.irq_pending() {
                return IrqOutcome::Spurious;
            }
            hal.disable_irq();

            if !hw.ctx.in_flight() {
                hw.logger.error(format_args!(
                    "unexpected interrupt, status 0x{:02x}",
                    hal.query_status().code()
                ));
                return IrqOutcome::Unexpected;
            }

            let status = hal.query_status();
            match hw.ctx.advance(status, &mut hal, &mut hw.logger) {
                Step::Continue => {
                    hal.enable_irq();
                    IrqOutcome::InProgress
                }
                Step::Done => {
                    self.done.signal();
                    IrqOutcome::Completed
                }
            }
        })
    }

    /// Run a transaction with the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub fn transfer(&self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        self.submit(msgs, self.config.timeout)
    }

    /// Run a transaction, retrying while the bus is busy or the START
    /// condition cannot be generated.
    ///
    /// Returns the number of messages transferred, which on success equals
    /// `msgs.len()`. Read messages receive their data only on success.
    ///
    /// # Errors
    ///
    /// `RemoteIo` once every attempt failed with a retryable error, otherwise
    /// the first non-retryable error.
    pub fn submit(&self, msgs: &mut [Message<'_>], timeout: MillisDurationU32) -> Result<usize, Error> {
        let mut delay = self.bus_lock.lock();
        let attempts = self.config.retries.max(1);
        for attempt in 1..=attempts {
            match self.attempt(msgs, timeout, &mut *delay) {
                Err(err) if err.is_retryable() => {
                    self.locked(|hw| {
                        hw.logger
                            .debug(format_args!("attempt {attempt}/{attempts} failed: {err:?}"));
                    });
                    delay.delay_us(self.config.retry_delay.ticks());
                }
                result => return result,
            }
        }
        self.locked(|hw| {
            hw.logger
                .error(format_args!("giving up after {attempts} attempts"));
        });
        Err(Error::RemoteIo)
    }

    /// Run a transaction exactly once.
    ///
    /// # Errors
    ///
    /// Any [`Error`] except `RemoteIo`; `Busy` and `StartFailed` included.
    pub fn submit_once(&self, msgs: &mut [Message<'_>], timeout: MillisDurationU32) -> Result<usize, Error> {
        let mut delay = self.bus_lock.lock();
        self.attempt(msgs, timeout, &mut *delay)
    }

    fn attempt(&self, msgs: &mut [Message<'_>], timeout: MillisDurationU32, delay: &mut D) -> Result<usize, Error> {
        TransferContext::validate(msgs)?;
        self.arm(msgs)?;

        let deadline = Deadline::after_millis(&self.clock, timeout);
        if self
            .done
            .wait(&self.clock, deadline, delay, self.config.poll_interval)
            .is_err()
        {
            // the interrupt path keeps the context until it finishes or the
            // bus is reset
            self.locked(|hw| {
                hw.logger.error(format_args!(
                    "transfer timed out after {} ms",
                    timeout.ticks()
                ));
            });
            return Err(Error::Timeout);
        }

        self.locked(|hw| {
            let result = hw.settle(msgs);
            hw.ctx.release();
            result
        })
    }

    /// Load `msgs` and put START on the bus with the interrupt enabled. From
    /// here on the interrupt path owns the context.
    fn arm(&self, msgs: &[Message<'_>]) -> Result<(), Error> {
        self.locked(|hw| {
            if hw.ctx.in_flight() {
                hw.logger
                    .debug(format_args!("previous transfer still owns the controller"));
                return Err(Error::Busy);
            }
            let mut hal = TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout);
            let status = hal.query_status();
            if !status.accepts_new_transfer() {
                hw.logger
                    .error(format_args!("bus busy, status 0x{:02x}", status.code()));
                return Err(Error::Busy);
            }

            hw.ctx.load(msgs)?;
            self.done.reset();
            hal.enable_irq();
            hal.disable_ack();
            hal.reset_enhanced_features();
            if hal.issue_start().is_err() {
                hal.soft_reset();
                hal.disable_irq();
                hw.ctx.release();
                hw.logger.error(format_args!("START not generated"));
                return Err(Error::StartFailed);
            }
            Ok(())
        })
    }

    /// Free a bus whose SDA line is held low by a target stuck mid-byte by
    /// clocking SCL by hand.
    ///
    /// # Errors
    ///
    /// `BusError` if SDA is still low after the last pulse.
    pub fn recover_bus(&self) -> Result<(), Error> {
        let mut delay = self.bus_lock.lock();
        if self.with_hal(|hal| hal.sda_high()) {
            return Ok(());
        }

        self.with_hal(|hal| hal.manual_scl(true));
        let mut pulses = 0;
        while pulses < RECOVERY_PULSES && !self.with_hal(|hal| hal.sda_high()) {
            self.with_hal(|hal| hal.drive_scl(false));
            delay.delay_us(RECOVERY_HALF_PERIOD_US);
            self.with_hal(|hal| hal.drive_scl(true));
            delay.delay_us(RECOVERY_HALF_PERIOD_US);
            pulses += 1;
        }

        self.locked(|hw| {
            let mut hal = TwiHal::new(&mut hw.regs, &self.clock, self.config.poll_timeout);
            hal.manual_scl(false);
            if hal.sda_high() {
                hw.logger
                    .debug(format_args!("bus recovered after {pulses} clock pulses"));
                Ok(())
            } else {
                hw.logger
                    .error(format_args!("SDA still low after {pulses} clock pulses"));
                Err(Error::BusError)
            }
        })
    }

    /// Direct access to the register bank, for board code and diagnostics.
    ///
    /// # Errors
    ///
    /// `Busy` while a transfer owns the controller.
    pub fn with_registers<T>(&self, f: impl FnOnce(&mut R) -> T) -> Result<T, Error> {
        self.locked(|hw| {
            if hw.ctx.in_flight() {
                return Err(Error::Busy);
            }
            Ok(f(&mut hw.regs))
        })
    }

    /// Tear the bus down and hand its parts back.
    pub fn free(self) -> (R, C, D, L) {
        let hw = self.hw.into_inner().into_inner();
        (hw.regs, self.clock, self.bus_lock.into_inner(), hw.logger)
    }
}
