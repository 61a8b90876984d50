//! [`Peripheral`] for the STM32 I2C v1 block (F1, F2, F4, L1 families).
//!
//! The block reports status flags rather than discrete protocol states, so [`Stm32Twi::poll`]
//! turns the pending flags into the [`Event`] they stand for. Call it from both the event and
//! the error interrupt and hand the result to the bus:
//!
//! ```ignore
//! static BUS: TwiBus<Stm32Twi, NoClock, 16, 16> =
//!     TwiBus::new(Stm32Twi::new(pac::I2C1, 8_000_000), NoClock);
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     BUS.poll_peripheral(Stm32Twi::poll);
//! }
//! ```
//!
//! The ACK bit is armed or disarmed when a byte is handled, which decides the acknowledge of
//! the byte after it; this holds as long as the interrupt latency stays below one byte time.

use embassy_stm32::pac::{self, i2c::I2c};

use crate::{status, Clock, Direction, Directive, Event, Peripheral, TwiBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    /// Start sent, address byte not written yet.
    MasterStart,
    MasterAddress(Direction),
    MasterTransmit,
    MasterReceive,
    SlaveTransmit,
    SlaveReceive,
}

impl Mode {
    fn is_master(self) -> bool {
        matches!(
            self,
            Mode::MasterStart
                | Mode::MasterAddress(_)
                | Mode::MasterTransmit
                | Mode::MasterReceive
        )
    }

    fn is_receiving(self) -> bool {
        matches!(self, Mode::MasterReceive | Mode::SlaveReceive)
    }
}

pub struct Stm32Twi {
    regs: I2c,
    pclk: u32,
    mode: Mode,
    own: u8,
    ack: bool,
    restart: bool,
    stop_requested: bool,
    received: u8,
}

impl Stm32Twi {
    /// `pclk` is the APB clock feeding the block, in Hz.
    pub const fn new(regs: I2c, pclk: u32) -> Self {
        Self {
            regs,
            pclk,
            mode: Mode::Idle,
            own: 0,
            ack: true,
            restart: false,
            stop_requested: false,
            received: 0,
        }
    }

    /// Reads and clears the pending flags. `None` if nothing relevant is pending.
    pub fn poll(&mut self) -> Option<Event> {
        let regs = self.regs;
        let sr1 = regs.sr1().read();

        if sr1.berr() {
            regs.sr1().modify(|w| w.set_berr(false));
            self.mode = Mode::Idle;
            return Some(Event::BusError);
        }

        if sr1.arlo() {
            regs.sr1().modify(|w| w.set_arlo(false));
            self.mode = Mode::Idle;
            return Some(Event::ArbitrationLost);
        }

        if sr1.af() {
            regs.sr1().modify(|w| w.set_af(false));

            let event = match self.mode {
                Mode::MasterAddress(dir) => Event::AddressNack(dir),
                Mode::MasterTransmit => Event::DataNack(Direction::Write),
                Mode::SlaveTransmit => {
                    self.mode = Mode::Idle;
                    Event::SlaveDataSent { acked: false }
                }
                _ => Event::Unrecognized(status::NO_INFO),
            };
            return Some(event);
        }

        if sr1.sb() {
            // Cleared by the address byte being written.
            self.mode = Mode::MasterStart;
            self.stop_requested = false;
            let event = if self.restart {
                Event::RepeatedStart
            } else {
                Event::Start
            };
            self.restart = false;
            return Some(event);
        }

        if sr1.addr() {
            // Reading SR2 after SR1 clears ADDR.
            let sr2 = regs.sr2().read();

            let event = if sr2.msl() {
                let dir = match self.mode {
                    Mode::MasterAddress(dir) => dir,
                    _ => Direction::Write,
                };
                self.mode = match dir {
                    Direction::Write => Mode::MasterTransmit,
                    Direction::Read => Mode::MasterReceive,
                };
                Event::AddressAck(dir)
            } else if sr2.tra() {
                self.mode = Mode::SlaveTransmit;
                Event::AddressedAsTransmitter {
                    arbitration_lost: false,
                }
            } else if sr2.gencall() {
                self.mode = Mode::SlaveReceive;
                Event::GeneralCall {
                    arbitration_lost: false,
                }
            } else {
                self.mode = Mode::SlaveReceive;
                Event::AddressedAsReceiver {
                    arbitration_lost: false,
                }
            };
            self.update_buffer_interrupts();
            return Some(event);
        }

        if sr1.stopf() {
            // Cleared by a write to CR1 after reading SR1.
            regs.cr1().modify(|w| w.set_pe(true));
            self.mode = Mode::Idle;
            self.update_buffer_interrupts();
            return Some(Event::SlaveStop);
        }

        if sr1.rxne() {
            let event = match self.mode {
                Mode::MasterReceive if self.ack => Event::DataAck(Direction::Read),
                Mode::MasterReceive => {
                    // The last byte: the stop has to be requested before DR is read.
                    regs.cr1().modify(|w| w.set_stop(true));
                    self.stop_requested = true;
                    Event::DataNack(Direction::Read)
                }
                Mode::SlaveReceive => Event::SlaveDataReceived { acked: self.ack },
                _ => Event::Unrecognized(status::NO_INFO),
            };
            self.received = regs.dr().read().dr();
            return Some(event);
        }

        if sr1.btf() {
            // Stays set until a requested start or stop goes out.
            let cr1 = regs.cr1().read();
            if cr1.start() || cr1.stop() {
                return None;
            }

            return match self.mode {
                Mode::MasterTransmit => Some(Event::DataAck(Direction::Write)),
                Mode::SlaveTransmit => Some(Event::SlaveDataSent { acked: true }),
                _ => None,
            };
        }

        None
    }

    /// RXNE/TXE interrupts only while receiving; transmit progress is tracked through BTF.
    fn update_buffer_interrupts(&self) {
        let receiving = self.mode.is_receiving();
        self.regs.cr2().modify(|w| w.set_itbufen(receiving));
    }

    fn set_ack(&mut self, ack: bool) {
        self.ack = ack;
        self.regs.cr1().modify(|w| w.set_ack(ack));
    }
}

impl Peripheral for Stm32Twi {
    fn set_frequency(&mut self, frequency: u32) {
        let regs = self.regs;
        // FREQ accepts 2..=50 MHz; the block tops out at fast mode.
        let freq = (self.pclk / 1_000_000).clamp(2, 50) as u8;
        let frequency = frequency.clamp(1_000, 400_000);

        regs.cr1().modify(|w| w.set_pe(false));

        regs.cr2().modify(|w| {
            w.set_itbufen(false);
            w.set_itevten(true);
            w.set_iterren(true);
            w.set_freq(freq);
        });

        if frequency <= 100_000 {
            regs.trise().modify(|w| w.set_trise(freq + 1));
            regs.ccr().modify(|w| {
                w.set_ccr((self.pclk / frequency / 2).clamp(4, 0xFFF) as u16);
                w.set_f_s(pac::i2c::vals::FS::STANDARD);
            });
        } else {
            regs.trise().modify(|w| w.set_trise(((freq as u16 * 300) / 1000 + 1) as u8));
            regs.ccr().modify(|w| {
                w.set_ccr((self.pclk / frequency / 3).clamp(1, 0xFFF) as u16);
                w.set_duty(pac::i2c::vals::Duty::DUTY2_1);
                w.set_f_s(pac::i2c::vals::FS::FAST);
            });
        }

        regs.cr1().modify(|w| {
            w.set_ack(true);
            w.set_pe(true);
        });
        self.ack = true;
    }

    fn write_data(&mut self, byte: u8) {
        if self.mode == Mode::MasterStart {
            self.mode = Mode::MasterAddress(if byte & 1 == 1 {
                Direction::Read
            } else {
                Direction::Write
            });
        }
        self.regs.dr().write(|w| w.set_dr(byte));
    }

    fn read_data(&mut self) -> u8 {
        self.received
    }

    fn own_address(&self) -> u8 {
        self.own
    }

    fn set_own_address(&mut self, sla: u8) {
        self.own = sla;
        self.regs.oar1().modify(|w| {
            w.set_addmode(pac::i2c::vals::Addmode::BIT7);
            w.set_add((sla & 0xFE) as u16);
        });
        self.regs.cr1().modify(|w| w.set_engc(sla & 1 == 1));
    }

    fn stop_pending(&self) -> bool {
        self.regs.cr1().read().stop()
    }

    fn proceed(&mut self, directive: Directive) {
        match directive {
            Directive::Proceed => {}
            Directive::Ack => self.set_ack(true),
            Directive::Nack => self.set_ack(false),
            Directive::Start => {
                self.restart = self.mode.is_master();
                self.set_ack(true);
                self.regs.cr1().modify(|w| w.set_start(true));
            }
            Directive::Stop => {
                if !self.stop_requested && self.mode.is_master() {
                    self.regs.cr1().modify(|w| w.set_stop(true));
                }
                self.stop_requested = false;
                self.mode = Mode::Idle;
                self.set_ack(true);
            }
            Directive::StopStart => {
                self.restart = false;
                self.regs.cr1().modify(|w| {
                    w.set_stop(true);
                    w.set_start(true);
                });
                self.mode = Mode::Idle;
            }
        }

        self.update_buffer_interrupts();
    }
}

impl<C: Clock, const TXBUFSIZE: usize, const RXBUFSIZE: usize>
    TwiBus<Stm32Twi, C, TXBUFSIZE, RXBUFSIZE>
{
    /// Drains every pending flag of the peripheral through the event handler.
    pub fn poll_peripheral(&self, poll: fn(&mut Stm32Twi) -> Option<Event>) {
        while let Some(event) =
            critical_section::with(|cs| poll(&mut self.inner.borrow_ref_mut(cs).peripheral))
        {
            self.handle_event(event);
        }
    }
}
