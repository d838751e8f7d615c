// Licensed under the Apache-2.0 license

//! Common types and constants for the TWI driver modules.
//!
//! This module provides the bus configuration, the clock divider search and
//! the capability flags reported to the consuming bus framework.

use crate::i2c::registers::ClockDivider;
use bitflags::bitflags;
use fugit::{MicrosDurationU32, MillisDurationU32};

/// Most messages a single transaction may carry.
pub const MAX_MESSAGES: usize = 8;
/// Largest payload of a single message, in bytes.
pub const MAX_MESSAGE_LEN: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    #[must_use]
    pub fn hz(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Capabilities advertised to the bus framework.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Functionality: u32 {
        const I2C = 1 << 0;
        const TEN_BIT_ADDR = 1 << 1;
        /// SMBus transfers emulated on top of plain I2C messages.
        const SMBUS_EMUL = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Bus or source frequency of zero.
    ZeroFrequency,
    /// No divider slows the source clock down to the requested rate.
    UnreachableFrequency,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    pub source_clock_hz: u32,
    /// Attempts made for retryable failures before giving up.
    pub retries: u8,
    pub timeout: MillisDurationU32,
    pub retry_delay: MicrosDurationU32,
    /// Bound on start/stop register polling.
    pub poll_timeout: MicrosDurationU32,
    /// Sleep between completion checks while a caller waits.
    pub poll_interval: MicrosDurationU32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    source_clock_hz: u32,
    retries: u8,
    timeout: MillisDurationU32,
    retry_delay: MicrosDurationU32,
    poll_timeout: MicrosDurationU32,
    poll_interval: MicrosDurationU32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: I2cSpeed::Standard,
            source_clock_hz: 24_000_000,
            retries: 2,
            timeout: MillisDurationU32::millis(1000),
            retry_delay: MicrosDurationU32::micros(100),
            poll_timeout: MicrosDurationU32::micros(1000),
            poll_interval: MicrosDurationU32::micros(10),
        }
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn source_clock_hz(mut self, hz: u32) -> Self {
        self.source_clock_hz = hz;
        self
    }
    #[must_use]
    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }
    #[must_use]
    pub fn timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = timeout;
        self
    }
    #[must_use]
    pub fn retry_delay(mut self, delay: MicrosDurationU32) -> Self {
        self.retry_delay = delay;
        self
    }
    #[must_use]
    pub fn poll_timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.poll_timeout = timeout;
        self
    }
    #[must_use]
    pub fn poll_interval(mut self, interval: MicrosDurationU32) -> Self {
        self.poll_interval = interval;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            source_clock_hz: self.source_clock_hz,
            retries: self.retries,
            timeout: self.timeout,
            retry_delay: self.retry_delay,
            poll_timeout: self.poll_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

/// Find the divider producing the fastest bus clock not above `bus_hz`.
///
/// `n` is scanned upward; for each `n` the search starts at the `m` that
/// would be exact and walks up until the real rate drops to the target.
///
/// # Errors
///
/// Returns `ZeroFrequency` for zero inputs and `UnreachableFrequency` when
/// even the largest divider is too fast.
pub fn clock_divider(source_clock_hz: u32, bus_hz: u32) -> Result<ClockDivider, ConfigurationError> {
    if source_clock_hz == 0 || bus_hz == 0 {
        return Err(ConfigurationError::ZeroFrequency);
    }
    let src = source_clock_hz / 10;
    let divider = src / bus_hz;
    if divider == 0 {
        return Ok(ClockDivider { m: 1, n: 0 });
    }

    for n in 0u8..8 {
        let pow = 1u32 << n;
        let Some(first_m) = (divider / pow).checked_sub(1) else {
            continue;
        };
        for m in first_m..16 {
            if src / (m + 1) / pow <= bus_hz {
                // m < 16 here, the cast is lossless
                return Ok(ClockDivider { m: m as u8, n });
            }
        }
    }
    Err(ConfigurationError::UnreachableFrequency)
}
