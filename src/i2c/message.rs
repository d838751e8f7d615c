// Licensed under the Apache-2.0 license

//! Caller-facing transfer messages.

use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};

/// Target address of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Address {
    Seven(u8),
    Ten(u16),
}

impl Address {
    /// Whether the address fits its addressing mode.
    #[must_use]
    pub fn is_valid(self) -> bool {
        match self {
            Self::Seven(addr) => addr <= 0x7f,
            Self::Ten(addr) => addr <= 0x3ff,
        }
    }
}

/// Conversion from the embedded-hal address types.
pub trait IntoAddress: embedded_hal::i2c::AddressMode + Copy {
    fn into_address(self) -> Address;
}

impl IntoAddress for SevenBitAddress {
    fn into_address(self) -> Address {
        Address::Seven(self)
    }
}

impl IntoAddress for TenBitAddress {
    fn into_address(self) -> Address {
        Address::Ten(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    /// R/W bit as sent in the address byte.
    #[must_use]
    pub fn bit(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 0,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Payload<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// One segment of a transaction. Messages are separated by repeated STARTs.
#[derive(Debug)]
pub struct Message<'a> {
    address: Address,
    pub(crate) payload: Payload<'a>,
}

impl<'a> Message<'a> {
    #[must_use]
    pub fn read(address: Address, buffer: &'a mut [u8]) -> Self {
        Self {
            address,
            payload: Payload::Read(buffer),
        }
    }

    #[must_use]
    pub fn write(address: Address, bytes: &'a [u8]) -> Self {
        Self {
            address,
            payload: Payload::Write(bytes),
        }
    }

    /// Borrow an embedded-hal operation as a message.
    pub fn from_operation<'o>(address: Address, op: &'o mut Operation<'_>) -> Message<'o> {
        match op {
            Operation::Read(buffer) => Message::read(address, buffer),
            Operation::Write(bytes) => Message::write(address, bytes),
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        match self.payload {
            Payload::Read(_) => Direction::Read,
            Payload::Write(_) => Direction::Write,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Read(buffer) => buffer.len(),
            Payload::Write(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
