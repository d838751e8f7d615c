// Licensed under the Apache-2.0 license

//! Memory-mapped TWI register block.
//!
//! Registers are 32 bits wide; only the low byte of each is meaningful.

use crate::i2c::registers::{ClockDivider, Control, LineControl, RegisterBank};
use core::ptr::NonNull;
use tock_registers::fields::Field;
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_bitfields! {
    u32,

    DATA [
        BYTE OFFSET(0) NUMBITS(8) []
    ],

    CONTROL [
        ACK OFFSET(2) NUMBITS(1) [],
        /// Write one to clear.
        INT_FLAG OFFSET(3) NUMBITS(1) [],
        STOP OFFSET(4) NUMBITS(1) [],
        START OFFSET(5) NUMBITS(1) [],
        BUS_EN OFFSET(6) NUMBITS(1) [],
        INT_EN OFFSET(7) NUMBITS(1) []
    ],

    STATUS [
        CODE OFFSET(0) NUMBITS(8) []
    ],

    /// `F_scl = F_src / 10 / ((M + 1) * 2^N)`
    CLOCK [
        N OFFSET(0) NUMBITS(3) [],
        M OFFSET(3) NUMBITS(4) []
    ],

    SOFT_RESET [
        RESET OFFSET(0) NUMBITS(1) []
    ],

    ENHANCED_FEATURES [
        VALUE OFFSET(0) NUMBITS(8) []
    ],

    LINE_CONTROL [
        SDA_EN OFFSET(0) NUMBITS(1) [],
        SDA_OUT OFFSET(1) NUMBITS(1) [],
        SCL_EN OFFSET(2) NUMBITS(1) [],
        SCL_OUT OFFSET(3) NUMBITS(1) [],
        SDA_STATE OFFSET(4) NUMBITS(1) [],
        SCL_STATE OFFSET(5) NUMBITS(1) []
    ]
}

register_structs! {
    pub TwiRegisters {
        // own and extended slave address, unused by the master engine
        (0x00 => _reserved0),
        (0x08 => data: ReadWrite<u32, DATA::Register>),
        (0x0c => control: ReadWrite<u32, CONTROL::Register>),
        (0x10 => status: ReadOnly<u32, STATUS::Register>),
        (0x14 => clock: WriteOnly<u32, CLOCK::Register>),
        (0x18 => soft_reset: WriteOnly<u32, SOFT_RESET::Register>),
        (0x1c => enhanced_features: WriteOnly<u32, ENHANCED_FEATURES::Register>),
        (0x20 => line_control: ReadWrite<u32, LINE_CONTROL::Register>),
        (0x24 => @END),
    }
}

const CONTROL_BITS: [(Control, Field<u32, CONTROL::Register>); 6] = [
    (Control::ACK, CONTROL::ACK),
    (Control::INT_FLAG, CONTROL::INT_FLAG),
    (Control::STOP, CONTROL::STOP),
    (Control::START, CONTROL::START),
    (Control::BUS_EN, CONTROL::BUS_EN),
    (Control::INT_EN, CONTROL::INT_EN),
];

const LINE_BITS: [(LineControl, Field<u32, LINE_CONTROL::Register>); 6] = [
    (LineControl::SDA_EN, LINE_CONTROL::SDA_EN),
    (LineControl::SDA_OUT, LINE_CONTROL::SDA_OUT),
    (LineControl::SCL_EN, LINE_CONTROL::SCL_EN),
    (LineControl::SCL_OUT, LINE_CONTROL::SCL_OUT),
    (LineControl::SDA_STATE, LINE_CONTROL::SDA_STATE),
    (LineControl::SCL_STATE, LINE_CONTROL::SCL_STATE),
];

fn bit(on: bool) -> u32 {
    u32::from(on)
}

/// Register block at a fixed address.
pub struct MmioTwi {
    regs: NonNull<TwiRegisters>,
}

// SAFETY: the block is only reached through the owning bus, which serializes
// every access.
unsafe impl Send for MmioTwi {}

impl MmioTwi {
    /// # Safety
    ///
    /// `base` must point to a TWI register block that stays mapped for the
    /// lifetime of the returned value, and no other code may access the block
    /// while it exists.
    #[must_use]
    pub const unsafe fn new(base: NonNull<TwiRegisters>) -> Self {
        Self { regs: base }
    }

    fn regs(&self) -> &TwiRegisters {
        // SAFETY: valid for the lifetime of `self`, see `new`.
        unsafe { self.regs.as_ref() }
    }
}

impl RegisterBank for MmioTwi {
    fn control(&self) -> Control {
        let value = self.regs().control.extract();
        CONTROL_BITS
            .iter()
            .filter(|(_, field)| value.is_set(*field))
            .fold(Control::empty(), |acc, (flag, _)| acc | *flag)
    }

    fn set_control(&mut self, control: Control) {
        self.regs().control.write(
            CONTROL::ACK.val(bit(control.contains(Control::ACK)))
                + CONTROL::INT_FLAG.val(bit(control.contains(Control::INT_FLAG)))
                + CONTROL::STOP.val(bit(control.contains(Control::STOP)))
                + CONTROL::START.val(bit(control.contains(Control::START)))
                + CONTROL::BUS_EN.val(bit(control.contains(Control::BUS_EN)))
                + CONTROL::INT_EN.val(bit(control.contains(Control::INT_EN))),
        );
    }

    fn status(&self) -> u8 {
        self.regs().status.read(STATUS::CODE) as u8
    }

    fn data(&self) -> u8 {
        self.regs().data.read(DATA::BYTE) as u8
    }

    fn set_data(&mut self, byte: u8) {
        self.regs().data.write(DATA::BYTE.val(u32::from(byte)));
    }

    fn set_clock(&mut self, divider: ClockDivider) {
        self.regs()
            .clock
            .write(CLOCK::M.val(u32::from(divider.m)) + CLOCK::N.val(u32::from(divider.n)));
    }

    fn soft_reset(&mut self) {
        self.regs().soft_reset.write(SOFT_RESET::RESET::SET);
    }

    fn set_enhanced_features(&mut self, value: u8) {
        self.regs()
            .enhanced_features
            .write(ENHANCED_FEATURES::VALUE.val(u32::from(value)));
    }

    fn line_control(&self) -> LineControl {
        let value = self.regs().line_control.extract();
        LINE_BITS
            .iter()
            .filter(|(_, field)| value.is_set(*field))
            .fold(LineControl::empty(), |acc, (flag, _)| acc | *flag)
    }

    fn set_line_control(&mut self, value: LineControl) {
        // sampled levels are read only
        self.regs().line_control.write(
            LINE_CONTROL::SDA_EN.val(bit(value.contains(LineControl::SDA_EN)))
                + LINE_CONTROL::SDA_OUT.val(bit(value.contains(LineControl::SDA_OUT)))
                + LINE_CONTROL::SCL_EN.val(bit(value.contains(LineControl::SCL_EN)))
                + LINE_CONTROL::SCL_OUT.val(bit(value.contains(LineControl::SCL_OUT))),
        );
    }
}
