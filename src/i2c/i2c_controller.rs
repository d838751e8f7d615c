// Licensed under the Apache-2.0 license

//! embedded-hal front end over any [`I2cMaster`].
//!
//! Device drivers written against `embedded_hal::i2c::I2c` use this type;
//! failed transfers are reported through the controller's logger before the
//! error is handed back.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use embedded_hal::i2c::{AddressMode, Operation};

pub struct I2cController<H, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cHardwareCore, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }
}

impl<H: I2cHardwareCore, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<A, H, L> embedded_hal::i2c::I2c<A> for I2cController<H, L>
where
    A: AddressMode,
    H: I2cMaster<A>,
    L: Logger,
{
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware
            .read(addr, buffer)
            .inspect_err(|e| self.logger.error(format_args!("read failed: {e:?}")))
    }

    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware
            .write(addr, bytes)
            .inspect_err(|e| self.logger.error(format_args!("write failed: {e:?}")))
    }

    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware
            .write_read(addr, bytes, buffer)
            .inspect_err(|e| self.logger.error(format_args!("write_read failed: {e:?}")))
    }

    fn transaction(&mut self, addr: A, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        self.hardware
            .transaction_slice(addr, operations)
            .inspect_err(|e| self.logger.error(format_args!("transaction failed: {e:?}")))
    }
}
