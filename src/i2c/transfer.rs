// Licensed under the Apache-2.0 license

//! Byte-level master transfer state machine.
//!
//! [`TransferContext::advance`] consumes one status code reported by the
//! controller after a bus event, performs exactly one register-level action
//! and records where the transaction stands. It never blocks; the only waits
//! are the bounded START/STOP polls inside the HAL.
//!
//! Message payloads are copied into the context when a transaction is
//! armed. A caller that gives up on a transfer therefore never leaves the
//! interrupt path writing into memory it no longer owns.

use crate::common::Logger;
use crate::i2c::common::{MAX_MESSAGES, MAX_MESSAGE_LEN};
use crate::i2c::error::Error;
use crate::i2c::hal::TwiHal;
use crate::i2c::message::{Address, Direction, Message, Payload};
use crate::i2c::registers::{RegisterBank, Status};
use crate::timer::Monotonic;
use core::fmt;
use heapless::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Armed, START requested, no bus event handled yet.
    Starting,
    Running,
    Completed(Result<(), Error>),
}

/// Outcome of one state machine step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// More bus events are expected.
    Continue,
    /// STOP issued, the result is final.
    Done,
}

struct XferMsg {
    address: Address,
    direction: Direction,
    data: Vec<u8, MAX_MESSAGE_LEN>,
}

pub struct TransferContext {
    msgs: Vec<XferMsg, MAX_MESSAGES>,
    msg_idx: usize,
    byte_idx: usize,
    second_addr_sent: bool,
    state: ControllerState,
}

impl Default for TransferContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            msgs: Vec::new(),
            msg_idx: 0,
            byte_idx: 0,
            second_addr_sent: false,
            state: ControllerState::Idle,
        }
    }

    /// Check that a transaction can be carried by the engine.
    ///
    /// # Errors
    ///
    /// `Invalid` for an empty transaction, too many messages, an address out
    /// of range for its mode, an empty read or an oversized payload.
    pub fn validate(msgs: &[Message<'_>]) -> Result<(), Error> {
        if msgs.is_empty() || msgs.len() > MAX_MESSAGES {
            return Err(Error::Invalid);
        }
        for msg in msgs {
            let empty_read = msg.direction() == Direction::Read && msg.is_empty();
            if !msg.address().is_valid() || empty_read || msg.len() > MAX_MESSAGE_LEN {
                return Err(Error::Invalid);
            }
        }
        Ok(())
    }

    /// Arm the context with a copy of `msgs`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::validate`].
    pub fn load(&mut self, msgs: &[Message<'_>]) -> Result<(), Error> {
        Self::validate(msgs)?;
        self.msgs.clear();
        for msg in msgs {
            let mut data: Vec<u8, MAX_MESSAGE_LEN> = Vec::new();
            let filled = match &msg.payload {
                Payload::Write(bytes) => data.extend_from_slice(bytes),
                Payload::Read(buffer) => data.resize(buffer.len(), 0),
            };
            filled.map_err(|()| Error::Invalid)?;
            self.msgs
                .push(XferMsg {
                    address: msg.address(),
                    direction: msg.direction(),
                    data,
                })
                .map_err(|_| Error::Invalid)?;
        }
        self.msg_idx = 0;
        self.byte_idx = 0;
        self.second_addr_sent = false;
        self.state = ControllerState::Starting;
        Ok(())
    }

    /// Copy received bytes back into the caller's read buffers.
    pub fn copy_out(&self, msgs: &mut [Message<'_>]) {
        for (msg, xfer) in msgs.iter_mut().zip(self.msgs.iter()) {
            if let Payload::Read(buffer) = &mut msg.payload {
                let n = buffer.len().min(xfer.data.len());
                if let (Some(dst), Some(src)) = (buffer.get_mut(..n), xfer.data.get(..n)) {
                    dst.copy_from_slice(src);
                }
            }
        }
    }

    /// Mark the transaction finished successfully after `completed`
    /// messages, as if the interrupt path had stopped there.
    #[cfg(test)]
    pub(crate) fn complete_after(&mut self, completed: usize) {
        self.msg_idx = completed;
        self.state = ControllerState::Completed(Ok(()));
    }

    /// Drop the transaction and return to `Idle`.
    pub fn release(&mut self) {
        self.msgs.clear();
        self.msg_idx = 0;
        self.byte_idx = 0;
        self.second_addr_sent = false;
        self.state = ControllerState::Idle;
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the interrupt path still owns the controller.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        matches!(
            self.state,
            ControllerState::Starting | ControllerState::Running
        )
    }

    /// Messages fully transferred so far.
    #[must_use]
    pub fn messages_completed(&self) -> usize {
        self.msg_idx
    }

    /// Handle one bus event.
    pub fn advance<R, C, L>(&mut self, status: Status, hal: &mut TwiHal<'_, R, C>, logger: &mut L) -> Step
    where
        R: RegisterBank,
        C: Monotonic,
        L: Logger,
    {
        self.state = ControllerState::Running;
        match status {
            Status::Idle => self.violation(hal, logger, format_args!("bus idle mid-transfer")),
            Status::StartSent | Status::RepeatedStartSent => self.send_address(hal, logger),
            Status::AddrWriteAck => {
                let pending_second = matches!(
                    self.msgs.get(self.msg_idx),
                    Some(XferMsg { address: Address::Ten(_), .. })
                ) && !self.second_addr_sent;
                if pending_second {
                    self.send_second_address(hal, logger)
                } else {
                    self.write_next(hal, logger)
                }
            }
            Status::SecondAddrWriteAck | Status::DataWriteAck => self.write_next(hal, logger),
            Status::AddrWriteNack | Status::SecondAddrWriteNack | Status::AddrReadNack => {
                self.finish(Err(Error::AddressNack), hal, logger)
            }
            Status::DataWriteNack => self.finish(Err(Error::DataNack), hal, logger),
            Status::ArbitrationLost | Status::ArbitrationLostSlaveRead => {
                self.finish(Err(Error::ArbitrationLost), hal, logger)
            }
            Status::AddrReadAck => self.begin_read(hal, logger),
            Status::DataReadAck => self.read_next(hal, logger),
            Status::DataReadNack => self.read_last(hal, logger),
            Status::BusError => self.finish(Err(Error::BusError), hal, logger),
            Status::Unknown(code) => {
                logger.error(format_args!("unknown status 0x{code:02x}"));
                self.finish(Err(Error::UnknownStatus(code)), hal, logger)
            }
        }
    }

    fn send_address<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let Some(msg) = self.msgs.get(self.msg_idx) else {
            return self.violation(hal, logger, format_args!("START with no message left"));
        };
        let rw = msg.direction.bit();
        let byte = match msg.address {
            Address::Seven(addr) => (addr << 1) | rw,
            // 1111 0xx r/w, xx = address bits 9:8
            Address::Ten(addr) => 0xf0 | ((((addr >> 8) & 0x3) as u8) << 1) | rw,
        };
        self.byte_idx = 0;
        self.second_addr_sent = false;
        hal.put_byte(byte);
        Step::Continue
    }

    fn send_second_address<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let Some(XferMsg {
            address: Address::Ten(addr),
            ..
        }) = self.msgs.get(self.msg_idx)
        else {
            return self.violation(hal, logger, format_args!("second address byte for 7-bit target"));
        };
        let low = (addr & 0xff) as u8;
        self.second_addr_sent = true;
        hal.put_byte(low);
        Step::Continue
    }

    fn write_next<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let Some(msg) = self.msgs.get(self.msg_idx) else {
            return self.violation(hal, logger, format_args!("write ACK with no message left"));
        };
        if let Some(&byte) = msg.data.get(self.byte_idx) {
            self.byte_idx += 1;
            hal.put_byte(byte);
            return Step::Continue;
        }
        self.next_message(hal, logger)
    }

    fn begin_read<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let len = match self.msgs.get(self.msg_idx) {
            Some(msg) if !msg.data.is_empty() => msg.data.len(),
            _ => return self.violation(hal, logger, format_args!("read ACK with nothing to read")),
        };
        if len == 1 {
            // the single byte is answered with NACK
            hal.disable_ack();
        } else {
            hal.enable_ack();
        }
        hal.clear_irq_flag();
        Step::Continue
    }

    fn read_next<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let idx = self.byte_idx;
        let len = self.msgs.get(self.msg_idx).map_or(0, |m| m.data.len());
        if idx >= len {
            return self.violation(
                hal,
                logger,
                format_args!("byte {idx} received for a {len} byte read"),
            );
        }
        if idx + 2 == len {
            // the last byte must go out with NACK
            hal.disable_ack();
        }
        let byte = hal.get_byte();
        if let Some(slot) = self
            .msgs
            .get_mut(self.msg_idx)
            .and_then(|m| m.data.get_mut(idx))
        {
            *slot = byte;
        }
        self.byte_idx += 1;
        Step::Continue
    }

    fn read_last<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        let idx = self.byte_idx;
        let len = self.msgs.get(self.msg_idx).map_or(0, |m| m.data.len());
        if idx + 1 != len {
            return self.violation(
                hal,
                logger,
                format_args!("NACKed byte {idx} is not the last of {len}"),
            );
        }
        let byte = hal.get_last_byte();
        if let Some(slot) = self
            .msgs
            .get_mut(self.msg_idx)
            .and_then(|m| m.data.get_mut(idx))
        {
            *slot = byte;
        }
        self.byte_idx += 1;
        self.next_message(hal, logger)
    }

    fn next_message<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        self.msg_idx += 1;
        self.byte_idx = 0;
        self.second_addr_sent = false;
        if self.msg_idx == self.msgs.len() {
            return self.finish(Ok(()), hal, logger);
        }
        if hal.issue_restart().is_err() {
            logger.error(format_args!("repeated START before message {} failed", self.msg_idx));
            return self.finish(Err(Error::StartFailed), hal, logger);
        }
        Step::Continue
    }

    fn violation<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
        what: fmt::Arguments<'_>,
    ) -> Step {
        logger.error(format_args!("protocol violation: {what}"));
        self.finish(Err(Error::LogicError), hal, logger)
    }

    /// Release the bus and record the final result. A STOP that fails is
    /// logged; the result stands.
    fn finish<R: RegisterBank, C: Monotonic, L: Logger>(
        &mut self,
        result: Result<(), Error>,
        hal: &mut TwiHal<'_, R, C>,
        logger: &mut L,
    ) -> Step {
        if hal.issue_stop().is_err() {
            logger.error(format_args!(
                "STOP not completed, status 0x{:02x}",
                hal.query_status().code()
            ));
        }
        if let Err(err) = result {
            logger.debug(format_args!(
                "transfer aborted at message {}: {err:?}",
                self.msg_idx
            ));
        }
        self.state = ControllerState::Completed(result);
        Step::Done
    }
}
