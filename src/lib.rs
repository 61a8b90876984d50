#![no_std]

//! Interrupt driven two-wire (TWI/I2C) bus controller running the master and the slave role
//! of the protocol on a single peripheral.
//!
//! Foreground code talks to a [`TwiBus`] through its control surface ([`TwiBus::initiate`],
//! [`TwiBus::is_busy`], [`TwiBus::wait_until_ready`], ...). The peripheral's interrupt feeds
//! discrete protocol [`Event`]s into [`handle_event_interrupt`], which routes them to the
//! master transaction engine or the slave response engine and always finishes by telling the
//! peripheral how to proceed.

#[macro_use]
mod fmt;

mod arbitration;
mod bus;
mod config;
mod event;
mod interrupts;
mod master;
mod peripheral;
mod receive_buffer;
mod send_buffer;
mod slave;
mod state_holder;

#[cfg(feature = "stm32")]
pub mod stm32;

pub use bus::TwiBus;
#[cfg(feature = "dump")]
pub use bus::StateDump;
pub use config::{
    BusConfig, MasterConfig, OnAddressed, OnCompleted, SlaveConfig, DEFAULT_ADDRESS_ATTEMPTS,
    DEFAULT_ARBITRATION_ATTEMPTS, DEFAULT_FREQUENCY, MAX_FREQUENCY, MIN_FREQUENCY,
};
pub use event::{status, Directive, Event};
pub use interrupts::{handle_event_interrupt, handle_status_interrupt};
pub use peripheral::{Clock, NoClock, Peripheral};

/// Reserved broadcast address.
pub const GENERAL_CALL_ADDRESS: u8 = 0x00;

/// Highest valid 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Which role currently owns the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::NoUninit)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Role {
    Idle,
    MasterActive,
    SlaveActive,
}

/// Value of the R/W bit following an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    /// Address byte as it goes on the wire: 7-bit address followed by the R/W bit.
    pub const fn address_byte(self, address: u8) -> u8 {
        (address << 1) | self as u8
    }
}

/// Kind of exchange this node takes part in while addressed as a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferKind {
    /// Another master writes to us.
    ReceiveFromMaster,
    /// Another master reads from us.
    TransmitToMaster,
    /// A general call write.
    GeneralCallReceive,
}

/// Result of the most recent master transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::NoUninit)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Outcome {
    /// Nothing finished yet (or a transaction is still in flight).
    Pending,
    Acknowledged,
    AddressNotAcknowledged,
    DataNotAcknowledged,
    ArbitrationLost,
    UnrecognizedCondition,
}

impl Outcome {
    pub fn result(self) -> Option<Result<(), TransferError>> {
        match self {
            Outcome::Pending => None,
            Outcome::Acknowledged => Some(Ok(())),
            Outcome::AddressNotAcknowledged => Some(Err(TransferError::AddressNotAcknowledged)),
            Outcome::DataNotAcknowledged => Some(Err(TransferError::DataNotAcknowledged)),
            Outcome::ArbitrationLost => Some(Err(TransferError::ArbitrationLost)),
            Outcome::UnrecognizedCondition => Some(Err(TransferError::UnrecognizedCondition)),
        }
    }
}

/// Why a request was refused before anything was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// Nothing to write and nothing to read.
    Empty,
    /// A read cannot be addressed to the general call address.
    GeneralCallRead,
    AddressOutOfRange,
    WriteTooLong,
    ReadTooLong,
}

/// Why a started transaction ended without being acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    AddressNotAcknowledged,
    DataNotAcknowledged,
    ArbitrationLost,
    UnrecognizedCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Request(RequestError),
    Transfer(TransferError),
    /// Returned by the non-blocking entry points while a transaction is in flight.
    Busy,
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Request(err)
    }
}

impl From<TransferError> for Error {
    fn from(err: TransferError) -> Self {
        Error::Transfer(err)
    }
}
