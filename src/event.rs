use crate::Direction;

/// A single protocol condition raised by the peripheral.
///
/// The master variants carry the direction of the phase they belong to: `AddressAck(Write)` is
/// SLA+W acknowledged, `DataAck(Read)` is a byte received and acknowledged by us, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Start,
    RepeatedStart,
    AddressAck(Direction),
    AddressNack(Direction),
    DataAck(Direction),
    DataNack(Direction),
    ArbitrationLost,

    /// Own SLA+R received. `arbitration_lost` is set if we were mastering at the time.
    AddressedAsTransmitter { arbitration_lost: bool },
    /// Own SLA+W received.
    AddressedAsReceiver { arbitration_lost: bool },
    GeneralCall { arbitration_lost: bool },
    /// A byte was received while addressed. `acked` tells whether we acknowledged it.
    SlaveDataReceived { acked: bool },
    /// A byte was sent while addressed. `acked` tells whether the master acknowledged it.
    SlaveDataSent { acked: bool },
    /// The last byte was sent but the master still acknowledged it.
    SlaveLastDataSent,
    /// Stop or repeated start while addressed.
    SlaveStop,

    BusError,
    Unrecognized(u8),
}

pub mod status {
    //! Classic TWI status register codes (prescaler bits masked off).

    pub const START: u8 = 0x08;
    pub const REP_START: u8 = 0x10;

    pub const MT_SLA_ACK: u8 = 0x18;
    pub const MT_SLA_NACK: u8 = 0x20;
    pub const MT_DATA_ACK: u8 = 0x28;
    pub const MT_DATA_NACK: u8 = 0x30;
    /// Shared by the master transmitter and the master receiver.
    pub const ARB_LOST: u8 = 0x38;

    pub const MR_SLA_ACK: u8 = 0x40;
    pub const MR_SLA_NACK: u8 = 0x48;
    pub const MR_DATA_ACK: u8 = 0x50;
    pub const MR_DATA_NACK: u8 = 0x58;

    pub const SR_SLA_ACK: u8 = 0x60;
    pub const SR_ARB_LOST_SLA_ACK: u8 = 0x68;
    pub const SR_GCALL_ACK: u8 = 0x70;
    pub const SR_ARB_LOST_GCALL_ACK: u8 = 0x78;
    pub const SR_DATA_ACK: u8 = 0x80;
    pub const SR_DATA_NACK: u8 = 0x88;
    pub const SR_GCALL_DATA_ACK: u8 = 0x90;
    pub const SR_GCALL_DATA_NACK: u8 = 0x98;
    pub const SR_STOP: u8 = 0xA0;

    pub const ST_SLA_ACK: u8 = 0xA8;
    pub const ST_ARB_LOST_SLA_ACK: u8 = 0xB0;
    pub const ST_DATA_ACK: u8 = 0xB8;
    pub const ST_DATA_NACK: u8 = 0xC0;
    pub const ST_LAST_DATA: u8 = 0xC8;

    pub const NO_INFO: u8 = 0xF8;
    pub const BUS_ERROR: u8 = 0x00;

    pub const MASK: u8 = 0xF8;
}

impl Event {
    /// Decodes a raw status register value. The prescaler bits are ignored.
    pub fn from_status(raw: u8) -> Self {
        use status::*;

        match raw & MASK {
            START => Event::Start,
            REP_START => Event::RepeatedStart,

            MT_SLA_ACK => Event::AddressAck(Direction::Write),
            MT_SLA_NACK => Event::AddressNack(Direction::Write),
            MT_DATA_ACK => Event::DataAck(Direction::Write),
            MT_DATA_NACK => Event::DataNack(Direction::Write),
            ARB_LOST => Event::ArbitrationLost,

            MR_SLA_ACK => Event::AddressAck(Direction::Read),
            MR_SLA_NACK => Event::AddressNack(Direction::Read),
            MR_DATA_ACK => Event::DataAck(Direction::Read),
            MR_DATA_NACK => Event::DataNack(Direction::Read),

            SR_SLA_ACK => Event::AddressedAsReceiver {
                arbitration_lost: false,
            },
            SR_ARB_LOST_SLA_ACK => Event::AddressedAsReceiver {
                arbitration_lost: true,
            },
            SR_GCALL_ACK => Event::GeneralCall {
                arbitration_lost: false,
            },
            SR_ARB_LOST_GCALL_ACK => Event::GeneralCall {
                arbitration_lost: true,
            },
            SR_DATA_ACK | SR_GCALL_DATA_ACK => Event::SlaveDataReceived { acked: true },
            SR_DATA_NACK | SR_GCALL_DATA_NACK => Event::SlaveDataReceived { acked: false },
            SR_STOP => Event::SlaveStop,

            ST_SLA_ACK => Event::AddressedAsTransmitter {
                arbitration_lost: false,
            },
            ST_ARB_LOST_SLA_ACK => Event::AddressedAsTransmitter {
                arbitration_lost: true,
            },
            ST_DATA_ACK => Event::SlaveDataSent { acked: true },
            ST_DATA_NACK => Event::SlaveDataSent { acked: false },
            ST_LAST_DATA => Event::SlaveLastDataSent,

            BUS_ERROR => Event::BusError,
            other => Event::Unrecognized(other),
        }
    }

    /// Whether the event belongs to the slave role.
    pub fn is_slave(&self) -> bool {
        matches!(
            self,
            Event::AddressedAsTransmitter { .. }
                | Event::AddressedAsReceiver { .. }
                | Event::GeneralCall { .. }
                | Event::SlaveDataReceived { .. }
                | Event::SlaveDataSent { .. }
                | Event::SlaveLastDataSent
                | Event::SlaveStop
        )
    }
}

/// How the peripheral has to proceed once an event has been handled.
///
/// Exactly one directive is issued per dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Directive {
    /// Resume clocking, leave the acknowledge setting alone.
    Proceed,
    /// Resume with acknowledge armed: ACK the next received byte, expect an ACK for the byte
    /// being sent as a slave, respond to the own address when idle.
    Ack,
    /// Resume with acknowledge disarmed: NACK the next received byte, or announce the byte
    /// being sent as a slave as the last one.
    Nack,
    /// Issue a (repeated) start as soon as the bus is free.
    Start,
    Stop,
    /// Stop, then start again as soon as the bus is free.
    StopStart,
}
