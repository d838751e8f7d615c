// Licensed under the Apache-2.0 license

//! Logging seam shared by the drivers in this crate.
//!
//! Drivers never talk to a console directly. They take a [`Logger`] and emit
//! formatted events through it, so a board can route them to a UART while
//! tests record them and production builds compile them away with
//! [`NoOpLogger`].

use core::fmt;

/// Sink for driver diagnostics.
///
/// Implementations must not block for long: the I2C driver calls into its
/// logger from interrupt context.
pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Logger that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Logger writing one line per event to a serial port.
///
/// Write errors are swallowed; losing a log line must never fail a transfer.
pub struct SerialLogger<W: embedded_io::Write> {
    port: W,
    verbose: bool,
}

impl<W: embedded_io::Write> SerialLogger<W> {
    /// Create a logger that only forwards errors.
    pub fn new(port: W) -> Self {
        Self {
            port,
            verbose: false,
        }
    }

    /// Create a logger that forwards debug events as well.
    pub fn verbose(port: W) -> Self {
        Self {
            port,
            verbose: true,
        }
    }

    /// Give back the underlying port.
    pub fn into_inner(self) -> W {
        self.port
    }

    fn emit(&mut self, level: &str, args: fmt::Arguments<'_>) {
        let _ = write!(self.port, "[twi] {level}: {args}\r\n");
    }
}

impl<W: embedded_io::Write> Logger for SerialLogger<W> {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        if self.verbose {
            self.emit("debug", args);
        }
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.emit("error", args);
    }
}
