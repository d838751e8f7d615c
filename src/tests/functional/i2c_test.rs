// Licensed under the Apache-2.0 license

//! Board-level master tests against a register-file target (EEPROM-like:
//! the first written byte selects a register, further bytes are stored and
//! reads continue from the selected register).
//!
//! The address right after the target's must be unpopulated.

use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource, Operation};
use embedded_io::Write;

const REGISTER: u8 = 0x40;
const FRAME: [u8; 5] = [REGISTER, 0xde, 0xad, 0xbe, 0xef];

/// Run every test, reporting one PASSED/FAILED line each. Returns whether
/// all of them passed.
pub fn run_i2c_tests<W: Write, H: I2cMaster>(uart: &mut W, i2c: &mut H, addr: u8) -> bool {
    let _ = writeln!(uart, "\r\n=== TWI Master Tests ===\r");

    let results = [
        test_write_then_read_back(uart, i2c, addr),
        test_transaction_slice(uart, i2c, addr),
        test_single_byte_read(uart, i2c, addr),
        test_absent_target_nacks(uart, i2c, addr),
    ];
    let passed = results.iter().all(|&ok| ok);

    let verdict = if passed { "Passed" } else { "Failed" };
    let _ = writeln!(uart, "\r\n=== TWI Master Tests {verdict} ===\r");
    passed
}

fn report<W: Write>(uart: &mut W, ok: bool) -> bool {
    let _ = writeln!(uart, "{}\r", if ok { "PASSED" } else { "FAILED" });
    ok
}

fn test_write_then_read_back<W: Write, H: I2cMaster>(uart: &mut W, i2c: &mut H, addr: u8) -> bool {
    let _ = write!(uart, "Testing write then read back... ");

    let mut buf = [0u8; 4];
    let ok = i2c.write(addr, &FRAME).is_ok()
        && i2c.write_read(addr, &[REGISTER], &mut buf).is_ok()
        && buf == [0xde, 0xad, 0xbe, 0xef];

    report(uart, ok)
}

fn test_transaction_slice<W: Write, H: I2cMaster>(uart: &mut W, i2c: &mut H, addr: u8) -> bool {
    let _ = write!(uart, "Testing multi-message transaction... ");

    let mut buf = [0u8; 2];
    let ok = i2c
        .transaction_slice(
            addr,
            &mut [Operation::Write(&[REGISTER + 1]), Operation::Read(&mut buf)],
        )
        .is_ok()
        && buf == [0xad, 0xbe];

    report(uart, ok)
}

fn test_single_byte_read<W: Write, H: I2cMaster>(uart: &mut W, i2c: &mut H, addr: u8) -> bool {
    let _ = write!(uart, "Testing single byte read... ");

    let mut buf = [0u8; 1];
    let ok = i2c.write(addr, &[REGISTER + 3]).is_ok()
        && i2c.read(addr, &mut buf).is_ok()
        && buf == [0xef];

    report(uart, ok)
}

fn test_absent_target_nacks<W: Write, H: I2cMaster>(uart: &mut W, i2c: &mut H, addr: u8) -> bool {
    let _ = write!(uart, "Testing absent target... ");

    let absent = addr.wrapping_add(1) & 0x7f;
    let ok = match i2c.write(absent, &[REGISTER]) {
        Err(e) => e.kind() == ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
        Ok(()) => false,
    };

    report(uart, ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::BufferPort;
    use crate::common::NoOpLogger;
    use crate::i2c::bus::TwiBus;
    use crate::i2c::common::I2cConfig;
    use crate::i2c::message::Address;
    use crate::i2c::sim::{self, SimTwi};
    use crate::timer::testing::{SleepDelay, StdClock};

    #[test]
    fn test_runner_passes_against_simulated_eeprom() {
        let bus = TwiBus::new(
            SimTwi::with_target(Address::Seven(0x50)),
            StdClock::new(),
            SleepDelay,
            NoOpLogger,
            I2cConfig::default(),
        );
        let mut port = BufferPort::default();

        let passed = sim::with_isr(
            || {
                bus.on_interrupt();
            },
            || run_i2c_tests(&mut port, &mut &bus, 0x50),
        );

        let text = port.text();
        assert!(passed, "{text}");
        assert_eq!(text.matches("PASSED").count(), 4);
        assert!(!text.contains("FAILED"));
    }

    #[test]
    fn test_runner_reports_failures() {
        let bus = TwiBus::new(
            SimTwi::new(),
            StdClock::new(),
            SleepDelay,
            NoOpLogger,
            I2cConfig::default(),
        );
        let mut port = BufferPort::default();

        let passed = sim::with_isr(
            || {
                bus.on_interrupt();
            },
            || run_i2c_tests(&mut port, &mut &bus, 0x50),
        );

        assert!(!passed);
        let text = port.text();
        assert_eq!(text.matches("FAILED").count(), 3);
        assert!(text.contains("Tests Failed"));
    }
}
