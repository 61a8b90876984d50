//! Master transaction engine.
//!
//! Drives one transaction at a time through start, address phase, data phase, an optional
//! repeated start into the read direction, and stop. Each handler returns a [`Step`]; ending a
//! transaction (stop, outcome, timestamp) is left to the caller.

use crate::{
    arbitration::{Admission, RetryBudget},
    config::MasterConfig,
    receive_buffer::ReceiveBuffer,
    send_buffer::SendBuffer,
    Direction, Directive, Outcome, Peripheral, RequestError, GENERAL_CALL_ADDRESS, MAX_ADDRESS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Phase {
    /// Held back while our slave role owns the wire.
    Deferred,
    /// Start requested, not on the bus yet.
    Starting,
    /// Address sent, waiting for the target.
    Address,
    Data,
}

#[derive(Debug)]
pub(crate) struct Transaction {
    address: u8,
    initial: Direction,
    direction: Direction,
    read_len: usize,
    phase: Phase,
    address_attempts: RetryBudget,
    pub(crate) arbitration_attempts: RetryBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue(Directive),
    /// The transaction is over; the bus has to be released.
    Finish(Outcome),
}

pub(crate) struct Master<const TXBUFSIZE: usize, const RXBUFSIZE: usize> {
    config: MasterConfig,
    transaction: Option<Transaction>,
    send: SendBuffer<TXBUFSIZE>,
    receive: ReceiveBuffer<RXBUFSIZE>,
}

impl<const TXBUFSIZE: usize, const RXBUFSIZE: usize> Master<TXBUFSIZE, RXBUFSIZE> {
    pub const fn new() -> Self {
        Self {
            config: MasterConfig::new(),
            transaction: None,
            send: SendBuffer::new(),
            receive: ReceiveBuffer::new(),
        }
    }

    pub fn set_config(&mut self, config: MasterConfig) {
        self.config = config;
    }

    /// Checks a request and derives the direction of its first phase.
    pub fn validate(
        address: u8,
        write_len: usize,
        read_len: usize,
    ) -> Result<Direction, RequestError> {
        if address > MAX_ADDRESS {
            return Err(RequestError::AddressOutOfRange);
        }
        if write_len == 0 && read_len == 0 {
            return Err(RequestError::Empty);
        }
        if read_len > 0 && address == GENERAL_CALL_ADDRESS {
            return Err(RequestError::GeneralCallRead);
        }
        if write_len > TXBUFSIZE {
            return Err(RequestError::WriteTooLong);
        }
        if read_len > RXBUFSIZE {
            return Err(RequestError::ReadTooLong);
        }

        Ok(if write_len > 0 {
            Direction::Write
        } else {
            Direction::Read
        })
    }

    /// Records a new transaction. Any previous one must have finished.
    pub fn begin(
        &mut self,
        address: u8,
        write: &[u8],
        read_len: usize,
        admission: Admission,
    ) -> Result<(), RequestError> {
        let direction = Self::validate(address, write.len(), read_len)?;

        self.send
            .load(write)
            .map_err(|_| RequestError::WriteTooLong)?;
        self.receive.accept(read_len);

        self.transaction = Some(Transaction {
            address,
            initial: direction,
            direction,
            read_len,
            phase: match admission {
                Admission::Start => Phase::Starting,
                Admission::Defer => Phase::Deferred,
            },
            address_attempts: RetryBudget::new(self.config.address_attempts),
            arbitration_attempts: RetryBudget::new(self.config.arbitration_attempts),
        });

        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.transaction.as_ref().map(|tr| tr.phase)
    }

    pub fn transaction_mut(&mut self) -> Option<&mut Transaction> {
        self.transaction.as_mut()
    }

    /// Our slave role took the wire; whatever was in progress starts over later.
    pub fn defer(&mut self) {
        if let Some(tr) = self.transaction.as_mut() {
            tr.phase = Phase::Deferred;
        }
    }

    /// Prepares a fresh attempt from the first phase.
    pub fn rearm(&mut self) {
        if let Some(tr) = self.transaction.as_mut() {
            tr.address_attempts.reset();
        }
        self.rewind();
    }

    pub fn finish(&mut self) {
        self.transaction = None;
    }

    /// Copies out the bytes received by the last transaction.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, usize> {
        self.receive.read(buf)
    }

    /// Start or repeated start is on the bus: returns the address byte to send.
    pub fn on_start(&mut self) -> Option<u8> {
        let tr = self.transaction.as_mut()?;
        tr.phase = Phase::Address;
        Some(tr.direction.address_byte(tr.address))
    }

    pub fn on_address_ack<P: Peripheral>(&mut self, dir: Direction, p: &mut P) -> Option<Step> {
        let tr = self.transaction.as_mut()?;
        if tr.direction != dir {
            return None;
        }

        tr.address_attempts.reset();
        tr.phase = Phase::Data;

        Some(match dir {
            Direction::Write => match self.send.next() {
                Some(byte) => {
                    p.write_data(byte);
                    Step::Continue(Directive::Proceed)
                }
                None => Step::Finish(Outcome::Acknowledged),
            },
            // The last byte goes unacknowledged to end the read.
            Direction::Read if tr.read_len > 1 => Step::Continue(Directive::Ack),
            Direction::Read => Step::Continue(Directive::Nack),
        })
    }

    pub fn on_address_nack(&mut self) -> Option<Step> {
        let tr = self.transaction.as_mut()?;

        if tr.address_attempts.spend() {
            trace!("address nack, retrying");
            self.rewind();
            Some(Step::Continue(Directive::StopStart))
        } else {
            Some(Step::Finish(Outcome::AddressNotAcknowledged))
        }
    }

    pub fn on_data_ack<P: Peripheral>(&mut self, dir: Direction, p: &mut P) -> Option<Step> {
        let tr = self.transaction.as_mut()?;
        if tr.direction != dir || tr.phase != Phase::Data {
            return None;
        }

        Some(match dir {
            Direction::Write => {
                if let Some(byte) = self.send.next() {
                    p.write_data(byte);
                    Step::Continue(Directive::Proceed)
                } else if tr.read_len > 0 {
                    self.switch_to_read()
                } else {
                    Step::Finish(Outcome::Acknowledged)
                }
            }
            Direction::Read => {
                let _ = self.receive.write_byte(p.read_data());
                if self.receive.remaining() > 1 {
                    Step::Continue(Directive::Ack)
                } else {
                    Step::Continue(Directive::Nack)
                }
            }
        })
    }

    pub fn on_data_nack<P: Peripheral>(&mut self, dir: Direction, p: &mut P) -> Option<Step> {
        let tr = self.transaction.as_mut()?;
        if tr.direction != dir || tr.phase != Phase::Data {
            return None;
        }

        Some(match dir {
            // Targets may decline the final byte of a write.
            Direction::Write if self.send.is_empty() => {
                if tr.read_len > 0 {
                    self.switch_to_read()
                } else {
                    Step::Finish(Outcome::Acknowledged)
                }
            }
            Direction::Write => Step::Finish(Outcome::DataNotAcknowledged),
            Direction::Read => {
                let _ = self.receive.write_byte(p.read_data());
                Step::Finish(Outcome::Acknowledged)
            }
        })
    }

    pub fn on_arbitration_lost(&mut self) -> Option<Step> {
        let tr = self.transaction.as_mut()?;

        if tr.arbitration_attempts.spend() {
            debug!("arbitration lost, {} attempts used", tr.arbitration_attempts.used());
            self.rearm();
            Some(Step::Continue(Directive::Start))
        } else {
            Some(Step::Finish(Outcome::ArbitrationLost))
        }
    }

    fn switch_to_read(&mut self) -> Step {
        if let Some(tr) = self.transaction.as_mut() {
            tr.direction = Direction::Read;
            tr.phase = Phase::Starting;
            tr.address_attempts.reset();
        }
        Step::Continue(Directive::Start)
    }

    fn rewind(&mut self) {
        if let Some(tr) = self.transaction.as_mut() {
            tr.direction = tr.initial;
            tr.phase = Phase::Starting;
            self.send.rewind();
            self.receive.accept(tr.read_len);
        }
    }
}
