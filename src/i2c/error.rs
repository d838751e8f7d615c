// Licensed under the Apache-2.0 license

use embedded_hal::i2c::NoAcknowledgeSource;

/// Transfer failures surfaced by the TWI engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Another master holds the bus.
    Busy,
    /// The controller did not emit a (repeated) START in time.
    StartFailed,
    /// Target did not acknowledge its address.
    AddressNack,
    /// Target did not acknowledge a data byte.
    DataNack,
    ArbitrationLost,
    /// Misplaced START/STOP detected on the bus, or SDA stuck low.
    BusError,
    /// Status code outside the documented protocol table.
    UnknownStatus(u8),
    /// The hardware reported a state the driver should never see here.
    LogicError,
    /// No terminal state within the caller's timeout.
    Timeout,
    /// Terminal success with fewer messages than requested.
    IncompleteTransfer,
    /// Retryable failures persisted through every attempt.
    RemoteIo,
    /// Malformed transaction (empty, oversized, bad address, empty read).
    Invalid,
}

impl Error {
    /// Whether the submission layer may retry after this error.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Busy | Self::StartFailed)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::ErrorKind;
        match self {
            Self::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Self::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Self::BusError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}
