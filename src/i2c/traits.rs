// Licensed under the Apache-2.0 license

//! # TWI Hardware Abstraction Traits
//!
//! Two small traits split what a bus framework needs from a controller:
//!
//! ```text
//! I2cHardwareCore (bring-up, reset, interrupt, recovery)
//!     └── I2cMaster<A> (master transfers, 7-bit or 10-bit addressing)
//! ```
//!
//! Both are implemented for `&TwiBus`, so a shared bus can be handed to
//! several drivers while its interrupt handler keeps running.

use crate::common::Logger;
use crate::i2c::bus::{IrqOutcome, TwiBus};
use crate::i2c::common::{I2cSpeed, MAX_MESSAGES};
use crate::i2c::error::Error;
use crate::i2c::message::{IntoAddress, Message};
use crate::i2c::registers::RegisterBank;
use crate::timer::Monotonic;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core controller interface.
///
/// # Examples
///
/// ```rust,no_run
/// use twi_ddk::i2c::{I2cHardwareCore, I2cSpeed};
///
/// fn bring_up<T: I2cHardwareCore>(mut controller: T) -> Result<u32, T::Error> {
///     controller.reset();
///     controller.configure_timing(I2cSpeed::Fast, 24_000_000)
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program the bus clock from the controller's source clock.
    ///
    /// Returns the bus frequency actually achieved, in Hz.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested speed cannot be derived from
    /// `source_clock_hz`.
    fn configure_timing(&mut self, speed: I2cSpeed, source_clock_hz: u32) -> Result<u32, Self::Error>;

    /// Soft-reset the controller.
    fn reset(&mut self);

    /// Handle one controller interrupt (called from ISR).
    fn handle_interrupt(&mut self) -> IrqOutcome;

    /// Attempt to recover the bus from a target holding SDA low.
    ///
    /// # Errors
    ///
    /// Returns an error if SDA is still low afterwards.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// Master mode operations.
///
/// Every embedded-hal [`Operation`] becomes one message; consecutive
/// messages are separated by a repeated START.
///
/// # Examples
///
/// ```rust,no_run
/// use twi_ddk::i2c::I2cMaster;
///
/// fn read_sensor<T: I2cMaster>(mut i2c: T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.write_read(0x48u8, &[0x00], &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write `bytes` to the target at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge, arbitration is
    /// lost, or the bus stays busy.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buffer` from the target at `addr`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`].
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read without releasing the bus in between.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write`], for either phase.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of operations as one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any operation fails; read buffers are only
    /// filled when the whole transaction succeeds.
    fn transaction_slice(&mut self, addr: A, ops_slice: &mut [Operation<'_>]) -> Result<(), Self::Error>;
}

impl<R, C, D, L> I2cHardwareCore for &TwiBus<R, C, D, L>
where
    R: RegisterBank,
    C: Monotonic,
    D: DelayNs,
    L: Logger,
{
    type Error = Error;

    fn configure_timing(&mut self, speed: I2cSpeed, source_clock_hz: u32) -> Result<u32, Error> {
        TwiBus::configure(*self, speed.hz(), source_clock_hz).map_err(|_| Error::Invalid)
    }

    fn reset(&mut self) {
        TwiBus::reset(*self);
    }

    fn handle_interrupt(&mut self) -> IrqOutcome {
        TwiBus::on_interrupt(*self)
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        TwiBus::recover_bus(*self)
    }
}

impl<A, R, C, D, L> I2cMaster<A> for &TwiBus<R, C, D, L>
where
    A: IntoAddress,
    R: RegisterBank,
    C: Monotonic,
    D: DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Error> {
        let mut msgs = [Message::write(addr.into_address(), bytes)];
        TwiBus::transfer(*self, &mut msgs).map(|_| ())
    }

    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Error> {
        let mut msgs = [Message::read(addr.into_address(), buffer)];
        TwiBus::transfer(*self, &mut msgs).map(|_| ())
    }

    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Error> {
        let address = addr.into_address();
        let mut msgs = [
            Message::write(address, bytes),
            Message::read(address, buffer),
        ];
        TwiBus::transfer(*self, &mut msgs).map(|_| ())
    }

    fn transaction_slice(&mut self, addr: A, ops_slice: &mut [Operation<'_>]) -> Result<(), Error> {
        let address = addr.into_address();
        let mut msgs: heapless::Vec<Message<'_>, MAX_MESSAGES> = heapless::Vec::new();
        for op in ops_slice.iter_mut() {
            msgs.push(Message::from_operation(address, op))
                .map_err(|_| Error::Invalid)?;
        }
        TwiBus::transfer(*self, &mut msgs).map(|_| ())
    }
}
