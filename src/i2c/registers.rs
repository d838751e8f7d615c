// Licensed under the Apache-2.0 license

//! Register-level view of the TWI controller.
//!
//! The engine never touches memory-mapped I/O directly. A board supplies a
//! [`RegisterBank`] for each bus instance; tests supply a simulated one.

use bitflags::bitflags;

bitflags! {
    /// Control register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Control: u8 {
        /// Acknowledge received bytes.
        const ACK = 1 << 2;
        /// Interrupt pending. Write one to clear, which releases the bus
        /// for the next protocol step.
        const INT_FLAG = 1 << 3;
        /// Generate STOP; cleared by hardware once sent.
        const STOP = 1 << 4;
        /// Generate (repeated) START; cleared by hardware once sent.
        const START = 1 << 5;
        /// Bus enable.
        const BUS_EN = 1 << 6;
        /// Interrupt enable.
        const INT_EN = 1 << 7;
    }
}

impl Control {
    /// Bits that trigger an action when written and must not be echoed back
    /// by a read-modify-write.
    pub const ACTION: Self = Self::INT_FLAG.union(Self::STOP).union(Self::START);
}

bitflags! {
    /// Line control register, used for manual SCL/SDA drive during bus
    /// recovery.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LineControl: u8 {
        const SDA_EN = 1 << 0;
        const SDA_OUT = 1 << 1;
        const SCL_EN = 1 << 2;
        const SCL_OUT = 1 << 3;
        /// Sampled SDA level (read only).
        const SDA_STATE = 1 << 4;
        /// Sampled SCL level (read only).
        const SCL_STATE = 1 << 5;
    }
}

/// Clock divider fields: `F_scl = F_src / 10 / ((m + 1) * 2^n)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockDivider {
    pub m: u8,
    pub n: u8,
}

impl ClockDivider {
    /// Bus frequency produced by this divider for a given source clock.
    #[must_use]
    pub fn bus_frequency(self, source_clock_hz: u32) -> u32 {
        (source_clock_hz / 10) / (u32::from(self.m) + 1) / (1u32 << self.n)
    }
}

/// Typed accessors to one controller's register block.
///
/// Implementations must follow the hardware semantics documented on
/// [`Control`]: writing `INT_FLAG` clears it, `START` and `STOP` self-clear.
pub trait RegisterBank {
    fn control(&self) -> Control;
    fn set_control(&mut self, control: Control);
    /// Raw protocol status code. Reading has no side effects.
    fn status(&self) -> u8;
    fn data(&self) -> u8;
    fn set_data(&mut self, byte: u8);
    fn set_clock(&mut self, divider: ClockDivider);
    fn soft_reset(&mut self);
    /// Enhanced feature register; zero restores plain byte mode.
    fn set_enhanced_features(&mut self, value: u8);
    fn line_control(&self) -> LineControl;
    fn set_line_control(&mut self, value: LineControl);
}

/// Protocol status codes reported after each bus event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Illegal START/STOP position on the bus.
    BusError,
    StartSent,
    RepeatedStartSent,
    AddrWriteAck,
    AddrWriteNack,
    DataWriteAck,
    DataWriteNack,
    ArbitrationLost,
    AddrReadAck,
    AddrReadNack,
    DataReadAck,
    DataReadNack,
    /// Arbitration lost in address phase, own address + read received.
    ArbitrationLostSlaveRead,
    SecondAddrWriteAck,
    SecondAddrWriteNack,
    /// No relevant status, bus released.
    Idle,
    Unknown(u8),
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::BusError,
            0x08 => Self::StartSent,
            0x10 => Self::RepeatedStartSent,
            0x18 => Self::AddrWriteAck,
            0x20 => Self::AddrWriteNack,
            0x28 => Self::DataWriteAck,
            0x30 => Self::DataWriteNack,
            0x38 => Self::ArbitrationLost,
            0x40 => Self::AddrReadAck,
            0x48 => Self::AddrReadNack,
            0x50 => Self::DataReadAck,
            0x58 => Self::DataReadNack,
            0xb0 => Self::ArbitrationLostSlaveRead,
            0xd0 => Self::SecondAddrWriteAck,
            0xd8 => Self::SecondAddrWriteNack,
            0xf8 => Self::Idle,
            other => Self::Unknown(other),
        }
    }
}

impl Status {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::BusError => 0x00,
            Self::StartSent => 0x08,
            Self::RepeatedStartSent => 0x10,
            Self::AddrWriteAck => 0x18,
            Self::AddrWriteNack => 0x20,
            Self::DataWriteAck => 0x28,
            Self::DataWriteNack => 0x30,
            Self::ArbitrationLost => 0x38,
            Self::AddrReadAck => 0x40,
            Self::AddrReadNack => 0x48,
            Self::DataReadAck => 0x50,
            Self::DataReadNack => 0x58,
            Self::ArbitrationLostSlaveRead => 0xb0,
            Self::SecondAddrWriteAck => 0xd0,
            Self::SecondAddrWriteNack => 0xd8,
            Self::Idle => 0xf8,
            Self::Unknown(code) => code,
        }
    }

    /// States from which a new transfer may be armed.
    #[must_use]
    pub fn accepts_new_transfer(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::BusError | Self::ArbitrationLostSlaveRead
        )
    }
}
