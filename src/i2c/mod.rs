// Licensed under the Apache-2.0 license

//! TWI (I2C) master driver module.
//!
//! This module provides an interrupt-driven TWI master transfer engine for
//! bare-metal and `no_std` environments. The byte-level protocol runs in
//! interrupt context, one status code per interrupt; callers submit whole
//! transactions and block, with a timeout, until the interrupt path reports
//! a terminal result.

pub mod bus;
pub mod common;
pub mod completion;
pub mod error;
pub mod hal;
pub mod i2c_controller;
pub mod message;
pub mod mmio;
pub mod registers;
pub mod traits;
pub mod transfer;

#[cfg(test)]
pub(crate) mod sim;

pub use bus::{IrqOutcome, TwiBus};
pub use common::{
    ConfigurationError, Functionality, I2cConfig, I2cConfigBuilder, I2cSpeed, MAX_MESSAGES,
    MAX_MESSAGE_LEN,
};
pub use error::Error;
pub use i2c_controller::I2cController;
pub use message::{Address, Direction, Message};
pub use mmio::MmioTwi;
pub use registers::{ClockDivider, Control, LineControl, RegisterBank, Status};
pub use traits::{I2cHardwareCore, I2cMaster};
