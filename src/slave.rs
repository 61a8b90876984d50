//! Slave response engine.

use crate::{
    config::SlaveConfig, receive_buffer::ReceiveBuffer, send_buffer::SendBuffer, Directive,
    Peripheral, TransferKind,
};

/// Shifted out when a master keeps reading past the end of our data.
const IDLE_BYTE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Answering from the slave send buffer, or from the configured default response.
    Transmit { default: bool },
    Receive,
    /// Acknowledge and drop everything.
    Discard,
}

#[derive(Debug)]
struct Exchange {
    kind: TransferKind,
    mode: Mode,
    count: usize,
}

pub(crate) struct Slave<const TXBUFSIZE: usize, const RXBUFSIZE: usize> {
    config: SlaveConfig,
    exchange: Option<Exchange>,
    send: SendBuffer<TXBUFSIZE>,
    receive: ReceiveBuffer<RXBUFSIZE>,
}

impl<const TXBUFSIZE: usize, const RXBUFSIZE: usize> Slave<TXBUFSIZE, RXBUFSIZE> {
    pub const fn new() -> Self {
        Self {
            config: SlaveConfig::disabled(),
            exchange: None,
            send: SendBuffer::new(),
            receive: ReceiveBuffer::new(),
        }
    }

    pub fn set_config(&mut self, config: SlaveConfig) {
        self.config = config;
    }

    pub fn set_identity(&mut self, address: u8, general_call: bool) {
        self.config.address = address;
        self.config.general_call = general_call;
    }

    /// Own address register value.
    pub fn sla(&self) -> u8 {
        self.config.sla()
    }

    pub fn is_engaged(&self) -> bool {
        self.exchange.is_some()
    }

    /// We have been addressed. Sets up the exchange and, when transmitting, loads the first
    /// byte.
    pub fn addressed<P: Peripheral>(&mut self, kind: TransferKind, p: &mut P) -> Directive {
        let callback = self.config.on_addressed;

        match kind {
            TransferKind::TransmitToMaster => {
                let supplied = match callback {
                    Some(cb) => self.send.fill_with(|buf| cb(kind, buf)) && self.send.len() > 0,
                    None => {
                        self.send.reset();
                        false
                    }
                };

                self.exchange = Some(Exchange {
                    kind,
                    mode: Mode::Transmit { default: !supplied },
                    count: 0,
                });

                self.send_next(p)
            }
            TransferKind::ReceiveFromMaster | TransferKind::GeneralCallReceive => {
                let limit = callback
                    .and_then(|cb| cb(kind, self.receive.storage_mut()))
                    .unwrap_or(0);

                let (mode, directive) = if limit > 0 {
                    self.receive.accept(limit);
                    // A single accepted byte is the last one.
                    let directive = if self.receive.get_limit() > 1 {
                        Directive::Ack
                    } else {
                        Directive::Nack
                    };
                    (Mode::Receive, directive)
                } else {
                    self.receive.reset();
                    (Mode::Discard, Directive::Ack)
                };

                self.exchange = Some(Exchange {
                    kind,
                    mode,
                    count: 0,
                });

                directive
            }
        }
    }

    /// Loads the next byte of a transmit exchange; shared by the addressing event and every
    /// acknowledged byte after it.
    pub fn send_next<P: Peripheral>(&mut self, p: &mut P) -> Directive {
        let Some(ex) = self.exchange.as_mut() else {
            p.write_data(IDLE_BYTE);
            return Directive::Nack;
        };

        let (byte, remaining) = match ex.mode {
            Mode::Transmit { default: false } => {
                let byte = self.send.next();
                (byte, self.send.remaining())
            }
            Mode::Transmit { default: true } => {
                let response = self.config.default_response;
                (
                    response.get(ex.count).copied(),
                    response.len().saturating_sub(ex.count + 1),
                )
            }
            Mode::Receive | Mode::Discard => (None, 0),
        };

        match byte {
            Some(byte) => {
                p.write_data(byte);
                ex.count += 1;
                if remaining > 0 {
                    Directive::Ack
                } else {
                    Directive::Nack
                }
            }
            None => {
                p.write_data(IDLE_BYTE);
                Directive::Nack
            }
        }
    }

    /// Takes in a received byte and tells whether to acknowledge the next one.
    pub fn store<P: Peripheral>(&mut self, p: &mut P) -> Directive {
        let byte = p.read_data();

        let Some(ex) = self.exchange.as_mut() else {
            return Directive::Ack;
        };

        match ex.mode {
            Mode::Receive => {
                if self.receive.write_byte(byte).is_ok() {
                    ex.count += 1;
                }
                if self.receive.remaining() > 1 {
                    Directive::Ack
                } else {
                    Directive::Nack
                }
            }
            Mode::Discard | Mode::Transmit { .. } => Directive::Ack,
        }
    }

    /// Ends the exchange and reports it through `on_completed`. Returns the kind and byte
    /// count, or `None` if no exchange was running.
    pub fn complete(&mut self) -> Option<(TransferKind, usize)> {
        let ex = self.exchange.take()?;

        let data: &[u8] = match ex.mode {
            Mode::Transmit { default: true } => {
                let response = self.config.default_response;
                &response[..ex.count.min(response.len())]
            }
            Mode::Transmit { default: false } => self.send.sent(),
            Mode::Receive => self.receive.as_slice(),
            Mode::Discard => &[],
        };

        if let Some(cb) = self.config.on_completed {
            cb(ex.kind, data);
        }

        Some((ex.kind, data.len()))
    }
}
