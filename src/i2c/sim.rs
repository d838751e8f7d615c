// Licensed under the Apache-2.0 license

//! Simulated TWI controller with one register-file target on the bus.
//!
//! The target behaves like a small EEPROM: the first byte written after its
//! address selects a register pointer, further written bytes are stored at
//! the pointer, reads return bytes from the pointer. The pointer survives a
//! repeated START, so "write register, restart, read" returns what was
//! stored earlier.

use crate::i2c::message::Address;
use crate::i2c::registers::{ClockDivider, Control, LineControl, RegisterBank};
use core::sync::atomic::{AtomicBool, Ordering};

/// SDA never releases, however many pulses are clocked.
pub const SDA_STUCK_FOREVER: u32 = u32::MAX;

pub struct SimTarget {
    pub address: Address,
    pub memory: [u8; 256],
    pointer: u8,
    pointer_set: bool,
    written_in_message: usize,
}

impl SimTarget {
    fn begin_message(&mut self) {
        self.pointer_set = false;
        self.written_in_message = 0;
    }

    fn write(&mut self, byte: u8) {
        self.written_in_message += 1;
        if self.pointer_set {
            self.memory[usize::from(self.pointer)] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        } else {
            self.pointer = byte;
            self.pointer_set = true;
        }
    }

    fn read(&mut self) -> u8 {
        let byte = self.memory[usize::from(self.pointer)];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

pub struct SimTwi {
    ctl: Control,
    int_flag: bool,
    start_bit: bool,
    stop_bit: bool,
    status: u8,
    data: u8,
    in_transfer: bool,
    second_addr_pending: bool,
    lcr: LineControl,

    pub target: Option<SimTarget>,

    // fault knobs
    pub stuck_start: bool,
    /// Only a repeated START, issued mid-transfer, never completes.
    pub stuck_restart: bool,
    pub stuck_stop: bool,
    /// START is accepted but no interrupt is ever raised.
    pub silent: bool,
    /// Status reported regardless of the simulated bus state.
    pub forced_status: Option<u8>,
    /// Target NACKs the data byte with this 1-based index in a message.
    pub nack_data_at: Option<usize>,
    /// Pulses needed before SDA is released.
    pub sda_low_pulses: u32,

    // observations
    pub starts: usize,
    pub stops: usize,
    pub resets: usize,
    pub control_writes: usize,
    pub scl_pulses: u32,
    pub efr: Option<u8>,
    pub divider: Option<ClockDivider>,
    /// Every byte the controller transmitted, address bytes included.
    pub sent: Vec<u8>,
    /// ACK setting at the moment each byte was received.
    pub ack_at_receive: Vec<bool>,
}

impl SimTwi {
    pub fn new() -> Self {
        Self {
            ctl: Control::empty(),
            int_flag: false,
            start_bit: false,
            stop_bit: false,
            status: 0xf8,
            data: 0,
            in_transfer: false,
            second_addr_pending: false,
            lcr: LineControl::empty(),
            target: None,
            stuck_start: false,
            stuck_restart: false,
            stuck_stop: false,
            silent: false,
            forced_status: None,
            nack_data_at: None,
            sda_low_pulses: 0,
            starts: 0,
            stops: 0,
            resets: 0,
            control_writes: 0,
            scl_pulses: 0,
            efr: None,
            divider: None,
            sent: Vec::new(),
            ack_at_receive: Vec::new(),
        }
    }

    pub fn with_target(address: Address) -> Self {
        let mut sim = Self::new();
        sim.target = Some(SimTarget {
            address,
            memory: [0; 256],
            pointer: 0,
            pointer_set: false,
            written_in_message: 0,
        });
        sim
    }

    pub fn memory(&self) -> &[u8; 256] {
        &self.target.as_ref().unwrap().memory
    }

    /// Put the controller mid-transfer at `status` with an interrupt pending.
    pub fn raise(&mut self, status: u8) {
        self.status = status;
        self.in_transfer = true;
        self.int_flag = true;
    }

    fn target_matches(&self, address: Address) -> bool {
        self.target.as_ref().is_some_and(|t| t.address == address)
    }

    fn address_phase(&mut self, byte: u8) {
        let read = byte & 1 == 1;
        let matched = if byte & 0xf8 == 0xf0 {
            let high = u16::from((byte >> 1) & 0x3);
            let matched = self
                .target
                .as_ref()
                .is_some_and(|t| matches!(t.address, Address::Ten(a) if a >> 8 == high));
            self.second_addr_pending = matched && !read;
            matched
        } else {
            self.target_matches(Address::Seven(byte >> 1))
        };
        if matched {
            if let Some(target) = self.target.as_mut() {
                target.begin_message();
            }
        }
        self.status = match (read, matched) {
            (false, true) => 0x18,
            (false, false) => 0x20,
            (true, true) => 0x40,
            (true, false) => 0x48,
        };
    }

    fn transmit(&mut self, byte: u8) {
        let Some(target) = self.target.as_mut() else {
            self.status = 0x30;
            return;
        };
        target.write(byte);
        self.status = if self.nack_data_at == Some(target.written_in_message) {
            0x30
        } else {
            0x28
        };
    }

    /// Bus activity released by clearing the interrupt flag.
    fn advance(&mut self) {
        match self.status {
            0x08 | 0x10 => {
                let byte = self.data;
                self.sent.push(byte);
                self.address_phase(byte);
            }
            0x18 if self.second_addr_pending => {
                let byte = self.data;
                self.sent.push(byte);
                self.second_addr_pending = false;
                let matched = self
                    .target
                    .as_ref()
                    .is_some_and(|t| matches!(t.address, Address::Ten(a) if a & 0xff == u16::from(byte)));
                self.status = if matched { 0xd0 } else { 0xd8 };
            }
            0x18 | 0xd0 | 0x28 => {
                let byte = self.data;
                self.sent.push(byte);
                self.transmit(byte);
            }
            0x40 | 0x50 => {
                let ack = self.ctl.contains(Control::ACK);
                self.ack_at_receive.push(ack);
                self.data = self.target.as_mut().map_or(0xff, SimTarget::read);
                self.status = if ack { 0x50 } else { 0x58 };
            }
            _ => return,
        }
        self.int_flag = true;
    }
}

impl RegisterBank for SimTwi {
    fn control(&self) -> Control {
        let mut ctl = self.ctl;
        ctl.set(Control::INT_FLAG, self.int_flag);
        ctl.set(Control::START, self.start_bit);
        ctl.set(Control::STOP, self.stop_bit);
        ctl
    }

    fn set_control(&mut self, control: Control) {
        self.control_writes += 1;
        self.ctl = control & (Control::ACK | Control::BUS_EN | Control::INT_EN);

        if control.contains(Control::STOP) {
            self.stops += 1;
            self.int_flag = false;
            self.start_bit = false;
            if self.stuck_stop {
                self.stop_bit = true;
            } else {
                self.stop_bit = false;
                self.status = 0xf8;
                self.in_transfer = false;
            }
        } else if control.contains(Control::START) {
            self.starts += 1;
            if self.stuck_start || (self.stuck_restart && self.in_transfer) {
                self.start_bit = true;
                return;
            }
            self.start_bit = false;
            self.status = if self.in_transfer { 0x10 } else { 0x08 };
            self.in_transfer = true;
            self.int_flag = !self.silent;
        } else if control.contains(Control::INT_FLAG) && self.int_flag {
            self.int_flag = false;
            self.advance();
        }
    }

    fn status(&self) -> u8 {
        self.forced_status.unwrap_or(self.status)
    }

    fn data(&self) -> u8 {
        self.data
    }

    fn set_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn set_clock(&mut self, divider: ClockDivider) {
        self.divider = Some(divider);
    }

    fn soft_reset(&mut self) {
        self.resets += 1;
        self.int_flag = false;
        self.start_bit = false;
        self.stop_bit = false;
        self.status = 0xf8;
        self.in_transfer = false;
        self.second_addr_pending = false;
    }

    fn set_enhanced_features(&mut self, value: u8) {
        self.efr = Some(value);
    }

    fn line_control(&self) -> LineControl {
        let mut lcr = self.lcr;
        lcr.set(LineControl::SDA_STATE, self.sda_low_pulses == 0);
        lcr.insert(LineControl::SCL_STATE);
        lcr
    }

    fn set_line_control(&mut self, value: LineControl) {
        let was_driven_low =
            self.lcr.contains(LineControl::SCL_EN) && !self.lcr.contains(LineControl::SCL_OUT);
        self.lcr = value - (LineControl::SDA_STATE | LineControl::SCL_STATE);
        if was_driven_low && value.contains(LineControl::SCL_EN | LineControl::SCL_OUT) {
            self.scl_pulses += 1;
            if self.sda_low_pulses != SDA_STUCK_FOREVER {
                self.sda_low_pulses = self.sda_low_pulses.saturating_sub(1);
            }
        }
    }
}

struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Run `f` while a second thread keeps calling `isr`, the way a
/// level-triggered interrupt line would.
pub fn with_isr<T>(isr: impl Fn() + Sync, f: impl FnOnce() -> T) -> T {
    let stop = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Acquire) {
                isr();
                std::thread::yield_now();
            }
        });
        let _stop = StopOnDrop(&stop);
        f()
    })
}
