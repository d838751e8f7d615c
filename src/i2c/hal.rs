// Licensed under the Apache-2.0 license

//! Primitive controller operations.
//!
//! Every wait on hardware is bounded by a [`Deadline`]; a primitive that runs
//! out of time reports [`Fail`] instead of spinning forever.

use crate::i2c::registers::{ClockDivider, Control, LineControl, RegisterBank, Status};
use crate::timer::{Deadline, Monotonic};
use fugit::MicrosDurationU32;

/// A primitive did not complete within its time bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fail;

/// Borrowed view of one controller, valid for a single protocol step.
pub struct TwiHal<'a, R: RegisterBank, C: Monotonic> {
    regs: &'a mut R,
    clock: &'a C,
    poll_timeout: MicrosDurationU32,
}

impl<'a, R: RegisterBank, C: Monotonic> TwiHal<'a, R, C> {
    pub fn new(regs: &'a mut R, clock: &'a C, poll_timeout: MicrosDurationU32) -> Self {
        Self {
            regs,
            clock,
            poll_timeout,
        }
    }

    /// Read-modify-write of the control register that never re-triggers
    /// START, STOP or the interrupt-flag clear.
    fn modify_control(&mut self, f: impl FnOnce(Control) -> Control) {
        let current = self.regs.control().difference(Control::ACTION);
        self.regs.set_control(f(current));
    }

    fn wait_until(&mut self, mut done: impl FnMut(&R) -> bool) -> Result<(), Fail> {
        let deadline = Deadline::after_micros(self.clock, self.poll_timeout);
        loop {
            if done(&*self.regs) {
                return Ok(());
            }
            if deadline.expired(self.clock) {
                // one last look, the bound may have elapsed while preempted
                return if done(&*self.regs) { Ok(()) } else { Err(Fail) };
            }
            core::hint::spin_loop();
        }
    }

    /// Generate a START (or repeated START) and wait for the controller to
    /// accept it.
    pub fn issue_start(&mut self) -> Result<(), Fail> {
        self.modify_control(|c| c | Control::START);
        self.wait_until(|regs| !regs.control().contains(Control::START))
    }

    /// Generate a repeated START from inside a transfer.
    ///
    /// The pending interrupt is cleared in the same write so the controller
    /// can put the condition on the bus.
    pub fn issue_restart(&mut self) -> Result<(), Fail> {
        self.modify_control(|c| c | Control::START | Control::INT_FLAG);
        self.wait_until(|regs| !regs.control().contains(Control::START))
    }

    /// Generate a STOP, then wait for the bit to clear and the bus to idle.
    pub fn issue_stop(&mut self) -> Result<(), Fail> {
        self.modify_control(|c| c | Control::STOP | Control::INT_FLAG);
        self.wait_until(|regs| !regs.control().contains(Control::STOP))?;
        self.wait_until(|regs| Status::from(regs.status()) == Status::Idle)
    }

    pub fn enable_ack(&mut self) {
        self.modify_control(|c| c | Control::ACK);
    }

    pub fn disable_ack(&mut self) {
        self.modify_control(|c| c - Control::ACK);
    }

    pub fn ack_enabled(&self) -> bool {
        self.regs.control().contains(Control::ACK)
    }

    /// Release the bus for the next protocol step.
    pub fn clear_irq_flag(&mut self) {
        self.modify_control(|c| c | Control::INT_FLAG);
    }

    pub fn irq_pending(&self) -> bool {
        self.regs
            .control()
            .contains(Control::INT_EN | Control::INT_FLAG)
    }

    pub fn enable_irq(&mut self) {
        self.modify_control(|c| c | Control::INT_EN);
    }

    pub fn disable_irq(&mut self) {
        self.modify_control(|c| c - Control::INT_EN);
    }

    pub fn enable_bus(&mut self) {
        self.modify_control(|c| c | Control::BUS_EN);
    }

    /// Load a byte and release the bus to transmit it.
    pub fn put_byte(&mut self, byte: u8) {
        self.regs.set_data(byte);
        self.clear_irq_flag();
    }

    /// Take a received byte and release the bus to receive the next one.
    pub fn get_byte(&mut self) -> u8 {
        let byte = self.regs.data();
        self.clear_irq_flag();
        byte
    }

    /// Take the final received byte. The controller has already answered it
    /// with NACK; the bus stays held for the following STOP or restart.
    pub fn get_last_byte(&mut self) -> u8 {
        self.regs.data()
    }

    pub fn query_status(&self) -> Status {
        Status::from(self.regs.status())
    }

    pub fn soft_reset(&mut self) {
        self.regs.soft_reset();
    }

    pub fn reset_enhanced_features(&mut self) {
        self.regs.set_enhanced_features(0);
    }

    pub fn set_clock(&mut self, divider: ClockDivider) {
        self.regs.set_clock(divider);
    }

    pub fn sda_high(&self) -> bool {
        self.regs.line_control().contains(LineControl::SDA_STATE)
    }

    /// Take manual control of SCL (true) or hand it back to the controller.
    pub fn manual_scl(&mut self, enabled: bool) {
        let mut lcr = self.regs.line_control() - (LineControl::SDA_STATE | LineControl::SCL_STATE);
        lcr.set(LineControl::SCL_EN, enabled);
        lcr.insert(LineControl::SCL_OUT);
        self.regs.set_line_control(lcr);
    }

    pub fn drive_scl(&mut self, high: bool) {
        let mut lcr = self.regs.line_control() - (LineControl::SDA_STATE | LineControl::SCL_STATE);
        lcr.set(LineControl::SCL_OUT, high);
        self.regs.set_line_control(lcr);
    }
}
