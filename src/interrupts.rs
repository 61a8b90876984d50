use critical_section::CriticalSection;

use crate::{
    arbitration::Resume,
    bus::{Inner, TwiBus},
    master::{Phase, Step},
    Clock, Directive, Event, Outcome, Peripheral, Role, TransferKind,
};

/// Entry point for the peripheral's interrupt: handles one protocol event.
pub fn handle_event_interrupt<
    P: Peripheral,
    C: Clock,
    const TXBUFSIZE: usize,
    const RXBUFSIZE: usize,
>(
    bus: &TwiBus<P, C, TXBUFSIZE, RXBUFSIZE>,
    event: Event,
) {
    bus.handle_event(event)
}

/// Same as [`handle_event_interrupt`], for backends that expose the raw status register.
pub fn handle_status_interrupt<
    P: Peripheral,
    C: Clock,
    const TXBUFSIZE: usize,
    const RXBUFSIZE: usize,
>(
    bus: &TwiBus<P, C, TXBUFSIZE, RXBUFSIZE>,
    status: u8,
) {
    bus.handle_event(Event::from_status(status))
}

impl<P: Peripheral, C: Clock, const TXBUFSIZE: usize, const RXBUFSIZE: usize>
    TwiBus<P, C, TXBUFSIZE, RXBUFSIZE>
{
    /// Routes `event` to the engine of the role it belongs to, then issues the single
    /// directive that engine came up with.
    pub fn handle_event(&self, event: Event) {
        critical_section::with(|cs| {
            self.record_event(cs, event);

            let mut guard = self.inner.borrow_ref_mut(cs);
            let inner = &mut *guard;

            let directive = match event {
                Event::Start | Event::RepeatedStart => self.on_start(cs, inner, event),

                Event::AddressAck(dir) => {
                    let step = inner.master.on_address_ack(dir, &mut inner.peripheral);
                    self.on_master_step(cs, inner, step, event)
                }
                Event::AddressNack(_) => {
                    let step = inner.master.on_address_nack();
                    self.on_master_step(cs, inner, step, event)
                }
                Event::DataAck(dir) => {
                    let step = inner.master.on_data_ack(dir, &mut inner.peripheral);
                    self.on_master_step(cs, inner, step, event)
                }
                Event::DataNack(dir) => {
                    let step = inner.master.on_data_nack(dir, &mut inner.peripheral);
                    self.on_master_step(cs, inner, step, event)
                }
                Event::ArbitrationLost => {
                    inner.sync_own_address();
                    let step = inner.master.on_arbitration_lost();
                    self.on_master_step(cs, inner, step, event)
                }

                Event::AddressedAsTransmitter { arbitration_lost } => {
                    self.on_addressed(cs, inner, TransferKind::TransmitToMaster, arbitration_lost)
                }
                Event::AddressedAsReceiver { arbitration_lost } => {
                    self.on_addressed(cs, inner, TransferKind::ReceiveFromMaster, arbitration_lost)
                }
                Event::GeneralCall { arbitration_lost } => self.on_addressed(
                    cs,
                    inner,
                    TransferKind::GeneralCallReceive,
                    arbitration_lost,
                ),
                Event::SlaveDataSent { acked: true } => inner.slave.send_next(&mut inner.peripheral),
                Event::SlaveDataReceived { acked: true } => {
                    inner.slave.store(&mut inner.peripheral)
                }
                Event::SlaveDataReceived { acked: false } => {
                    inner.slave.store(&mut inner.peripheral);
                    self.on_slave_done(cs, inner)
                }
                Event::SlaveDataSent { acked: false }
                | Event::SlaveLastDataSent
                | Event::SlaveStop => self.on_slave_done(cs, inner),

                Event::BusError | Event::Unrecognized(_) => self.recover(cs, inner, event),
            };

            inner.peripheral.proceed(directive);
        })
    }

    fn on_start(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
        event: Event,
    ) -> Directive {
        inner.sync_own_address();

        match inner.master.on_start() {
            Some(address) => {
                inner.peripheral.write_data(address);
                self.roles.set_role(cs, Role::MasterActive);
                Directive::Proceed
            }
            None => self.recover(cs, inner, event),
        }
    }

    fn on_master_step(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
        step: Option<Step>,
        event: Event,
    ) -> Directive {
        match step {
            Some(Step::Continue(directive)) => {
                // Retries begin with the bus released.
                if matches!(event, Event::AddressNack(_) | Event::ArbitrationLost) {
                    self.roles.set_role(cs, Role::Idle);
                }
                directive
            }
            Some(Step::Finish(outcome)) => {
                self.finish_master(cs, inner, outcome);
                Directive::Stop
            }
            None => self.recover(cs, inner, event),
        }
    }

    fn on_addressed(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
        kind: TransferKind,
        arbitration_lost: bool,
    ) -> Directive {
        if inner.slave.is_engaged() {
            inner.slave.complete();
        }

        inner.coordinator.block();
        if inner.master.is_active() {
            if arbitration_lost {
                debug!("twi: lost arbitration to a master addressing us");
            }
            inner.master.defer();
        }

        self.roles.set_role(cs, Role::SlaveActive);
        trace!("twi: addressed as {}", kind);

        inner.slave.addressed(kind, &mut inner.peripheral)
    }

    fn on_slave_done(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
    ) -> Directive {
        inner.slave.complete();

        match inner.master.phase() {
            None => {
                inner.coordinator.release();
                inner.sync_own_address();
                self.roles.set_role(cs, Role::Idle);
                inner.listen()
            }
            Some(Phase::Deferred) => {
                inner.sync_own_address();
                self.roles.set_role(cs, Role::Idle);
                self.resume_master(cs, inner)
            }
            // Our own transaction holds the wire: nothing of the slave side to finish.
            Some(_) => {
                debug!("twi: slave completion while mastering");
                inner.coordinator.release();
                Directive::Proceed
            }
        }
    }

    fn resume_master(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
    ) -> Directive {
        let resume = match inner.master.transaction_mut() {
            Some(tr) => inner.coordinator.resume(&mut tr.arbitration_attempts),
            None => Resume::GiveUp,
        };

        match resume {
            Resume::Restart => {
                inner.master.rearm();
                Directive::Start
            }
            Resume::GiveUp => {
                self.finish_master(cs, inner, Outcome::ArbitrationLost);
                inner.listen()
            }
        }
    }

    /// Bus error, unknown status or an event that makes no sense in the current state: both
    /// roles are reset and the bus is released.
    fn recover(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
        event: Event,
    ) -> Directive {
        warn!("twi: unexpected {}", event);

        inner.last_bus_error = Some(event);
        // Only ever updated inside the critical section.
        self.bus_errors.store(
            self.bus_errors().saturating_add(1),
            core::sync::atomic::Ordering::SeqCst,
        );

        if inner.slave.is_engaged() {
            inner.slave.complete();
        }
        inner.coordinator.release();

        if inner.master.is_active() {
            self.finish_master(cs, inner, Outcome::UnrecognizedCondition);
        } else {
            inner.sync_own_address();
            self.roles.set_role(cs, Role::Idle);
        }

        Directive::Stop
    }
}
