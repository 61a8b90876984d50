use core::cell::RefCell;
use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::task::Poll;

use atomic::Atomic;
use critical_section::{CriticalSection, Mutex};
use embassy_sync::waitqueue::MultiWakerRegistration;
use heapless::Deque;

use crate::{
    arbitration::{Admission, Coordinator},
    config::{BusConfig, MasterConfig, SlaveConfig, MAX_FREQUENCY, MIN_FREQUENCY},
    master::Master,
    slave::Slave,
    state_holder::StateHolder,
    Clock, Directive, Error, Event, Outcome, Peripheral, RequestError, Role,
};

pub const ROLES_HISTORY_SIZE: usize = 5;
pub const EVENTS_HISTORY_SIZE: usize = 5;

/// Tasks that can wait on the bus at the same time before all of them get woken early.
const WAITERS: usize = 4;

#[cfg(feature = "dump")]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateDump {
    pub role_history: [Role; ROLES_HISTORY_SIZE],
    pub current_role: Role,
    pub event_history: [Event; EVENTS_HISTORY_SIZE],
    pub busy: bool,
    pub outcome: Outcome,
    pub bus_errors: u32,
}

/// State shared between the foreground and the event handler. Only ever touched inside a
/// critical section.
pub(crate) struct Inner<P, C, const TXBUFSIZE: usize, const RXBUFSIZE: usize> {
    pub peripheral: P,
    pub clock: C,
    pub master: Master<TXBUFSIZE, RXBUFSIZE>,
    pub slave: Slave<TXBUFSIZE, RXBUFSIZE>,
    pub coordinator: Coordinator,
    pub completed_at: Option<u32>,
    pub last_bus_error: Option<Event>,
    /// A finished transaction whose results its initiator has not collected yet.
    pub claimed: bool,
    pub waiters: MultiWakerRegistration<WAITERS>,
}

impl<P: Peripheral, C, const TXBUFSIZE: usize, const RXBUFSIZE: usize>
    Inner<P, C, TXBUFSIZE, RXBUFSIZE>
{
    /// Applies a pending own address change.
    pub fn sync_own_address(&mut self) {
        let sla = self.slave.sla();
        if self.peripheral.own_address() != sla {
            self.peripheral.set_own_address(sla);
        }
    }

    /// Directive that leaves the peripheral listening for its own address, if it has one.
    pub fn listen(&self) -> Directive {
        if self.slave.sla() != 0 {
            Directive::Ack
        } else {
            Directive::Nack
        }
    }
}

/// The two-wire bus: owns the peripheral and runs both protocol roles on it.
///
/// `TXBUFSIZE` bounds what a master transaction can write and what a slave exchange can
/// answer from its callback; `RXBUFSIZE` bounds what either role can receive.
pub struct TwiBus<P, C, const TXBUFSIZE: usize, const RXBUFSIZE: usize> {
    pub(crate) inner: Mutex<RefCell<Inner<P, C, TXBUFSIZE, RXBUFSIZE>>>,

    pub(crate) busy: AtomicBool,
    pub(crate) outcome: Atomic<Outcome>,

    pub(crate) roles: StateHolder<ROLES_HISTORY_SIZE>,
    pub(crate) events_history: Mutex<RefCell<Deque<Event, EVENTS_HISTORY_SIZE>>>,
    pub(crate) bus_errors: AtomicU32,
}

/// Reserves the results of a finished transaction for the task that started it. Dropping it
/// opens the bus to new initiations.
struct Claim<'a, P: Peripheral, C: Clock, const TXBUFSIZE: usize, const RXBUFSIZE: usize> {
    bus: &'a TwiBus<P, C, TXBUFSIZE, RXBUFSIZE>,
}

impl<'a, P: Peripheral, C: Clock, const TXBUFSIZE: usize, const RXBUFSIZE: usize> Drop
    for Claim<'a, P, C, TXBUFSIZE, RXBUFSIZE>
{
    fn drop(&mut self) {
        critical_section::with(|cs| {
            let mut inner = self.bus.inner.borrow_ref_mut(cs);
            inner.claimed = false;
            inner.waiters.wake();
        });
    }
}

#[cfg(feature = "dump")]
fn deque_into_array<T: Copy, const N: usize>(d: &Deque<T, N>, arr: &mut [T; N]) {
    let n = d.len();
    let (a, b) = d.as_slices();
    let s = N - n;

    arr[s..s + a.len()].copy_from_slice(a);
    arr[s + a.len()..].copy_from_slice(b);
}

impl<P, C, const TXBUFSIZE: usize, const RXBUFSIZE: usize> TwiBus<P, C, TXBUFSIZE, RXBUFSIZE> {
    pub const fn new(peripheral: P, clock: C) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                peripheral,
                clock,
                master: Master::new(),
                slave: Slave::new(),
                coordinator: Coordinator::new(),
                completed_at: None,
                last_bus_error: None,
                claimed: false,
                waiters: MultiWakerRegistration::new(),
            })),
            busy: AtomicBool::new(false),
            outcome: Atomic::new(Outcome::Pending),
            roles: StateHolder::new(),
            events_history: Mutex::new(RefCell::new(Deque::new())),
            bus_errors: AtomicU32::new(0),
        }
    }
}

impl<P: Peripheral, C: Clock, const TXBUFSIZE: usize, const RXBUFSIZE: usize>
    TwiBus<P, C, TXBUFSIZE, RXBUFSIZE>
{
    /// Programs the bus speed and master budgets and starts listening for the own address.
    ///
    /// The frequency is clamped to `MIN_FREQUENCY..=MAX_FREQUENCY`.
    pub fn init(&self, config: BusConfig) {
        let frequency = config.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY);

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.master.set_config(config.master);
            inner.peripheral.set_frequency(frequency);
            inner.sync_own_address();
            let directive = inner.listen();
            inner.peripheral.proceed(directive);
        });

        debug!("twi: initialized at {} Hz", frequency);
    }

    /// Retry budgets for transactions initiated from now on.
    pub fn configure_master(&self, config: MasterConfig) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).master.set_config(config));
    }

    /// Installs the slave identity and callbacks.
    ///
    /// The callbacks run from the event handler, inside the bus critical section: they may poll
    /// [`is_busy`](Self::is_busy) and friends but must not initiate transactions.
    pub fn configure_slave(&self, config: SlaveConfig) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.slave.set_config(config);
            self.apply_identity(&mut inner);
        });
    }

    /// Changes only the own address. Takes effect right away if the bus is idle, otherwise as
    /// soon as the current exchange or transaction ends.
    pub fn assign_address(&self, address: u8, general_call: bool) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            inner.slave.set_identity(address, general_call);
            self.apply_identity(&mut inner);
        });
    }

    fn apply_identity(&self, inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>) {
        if !inner.master.is_active() && !inner.coordinator.is_blocking() {
            inner.sync_own_address();
            let directive = inner.listen();
            inner.peripheral.proceed(directive);
        }
    }

    /// Records a new master transaction and returns at once. Blocks while another one is
    /// still in flight.
    ///
    /// `write` is copied; up to `read_len` bytes are received and can be fetched with
    /// [`read`](Self::read) once the bus is ready again.
    pub fn initiate(&self, address: u8, write: &[u8], read_len: usize) -> Result<(), Error> {
        Master::<TXBUFSIZE, RXBUFSIZE>::validate(address, write.len(), read_len)?;

        loop {
            match self.try_initiate(address, write, read_len) {
                Err(Error::Busy) => core::hint::spin_loop(),
                other => return other,
            }
        }
    }

    pub fn initiate_write(&self, address: u8, data: &[u8]) -> Result<(), Error> {
        self.initiate(address, data, 0)
    }

    pub fn initiate_read(&self, address: u8, len: usize) -> Result<(), Error> {
        self.initiate(address, &[], len)
    }

    /// Like [`initiate`](Self::initiate) but fails with [`Error::Busy`] instead of waiting.
    pub fn try_initiate(&self, address: u8, write: &[u8], read_len: usize) -> Result<(), Error> {
        self.start(address, write, read_len, false)
    }

    /// Starts a transaction whose results are reserved for the caller until the returned
    /// claim is dropped.
    fn try_claim(
        &self,
        address: u8,
        write: &[u8],
        read_len: usize,
    ) -> Result<Claim<'_, P, C, TXBUFSIZE, RXBUFSIZE>, Error> {
        self.start(address, write, read_len, true)?;
        Ok(Claim { bus: self })
    }

    fn start(&self, address: u8, write: &[u8], read_len: usize, claim: bool) -> Result<(), Error> {
        Master::<TXBUFSIZE, RXBUFSIZE>::validate(address, write.len(), read_len)?;

        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            let inner = &mut *guard;

            if self.busy.load(Ordering::SeqCst) || inner.claimed {
                return Err(Error::Busy);
            }
            if inner.peripheral.stop_pending() {
                return Err(Error::Busy);
            }

            let admission = inner.coordinator.admit();
            inner.master.begin(address, write, read_len, admission)?;
            inner.completed_at = None;
            inner.claimed = claim;

            self.outcome.store(Outcome::Pending, Ordering::SeqCst);
            self.busy.store(true, Ordering::SeqCst);

            match admission {
                Admission::Start => inner.peripheral.proceed(Directive::Start),
                Admission::Defer => debug!("twi: start deferred, slave engaged"),
            }

            Ok(())
        })
    }

    /// True from initiation until the transaction has ended, successfully or not.
    ///
    /// A transaction started by [`transfer`](Self::transfer) or
    /// [`transfer_async`](Self::transfer_async) keeps new initiations out a little longer,
    /// until its results have been collected.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Spins until the current transaction has ended.
    pub fn wait_until_ready(&self) {
        while self.is_busy() {
            core::hint::spin_loop();
        }
    }

    /// Whether the last finished transaction was acknowledged.
    pub fn last_acknowledged(&self) -> bool {
        self.last_outcome() == Outcome::Acknowledged
    }

    pub fn last_outcome(&self) -> Outcome {
        self.outcome.load(Ordering::SeqCst)
    }

    /// When the last transaction ended, per the bus clock. `None` until one has ended.
    pub fn completed_at(&self) -> Option<u32> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).completed_at)
    }

    /// Copies out what the last transaction received.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }

        critical_section::with(|cs| {
            self.inner
                .borrow_ref(cs)
                .master
                .read(buf)
                .map_err(|_| Error::Request(RequestError::ReadTooLong))
        })
    }

    /// Resolves with the outcome once the current transaction has ended. Any number of tasks
    /// may wait at the same time.
    pub async fn finished(&self) -> Outcome {
        poll_fn(|cx| {
            critical_section::with(|cs| {
                if !self.is_busy() {
                    return Poll::Ready(self.last_outcome());
                }
                self.inner.borrow_ref_mut(cs).waiters.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    /// Resolves once a new transaction can be started.
    async fn vacant(&self) {
        poll_fn(|cx| {
            critical_section::with(|cs| {
                let mut inner = self.inner.borrow_ref_mut(cs);
                if !self.is_busy() && !inner.claimed {
                    return Poll::Ready(());
                }
                inner.waiters.register(cx.waker());
                Poll::Pending
            })
        })
        .await
    }

    /// Runs a complete transaction, spinning until it ends. `read` is filled on success.
    pub fn transfer(&self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Error> {
        Master::<TXBUFSIZE, RXBUFSIZE>::validate(address, write.len(), read.len())?;

        let _claim = loop {
            match self.try_claim(address, write, read.len()) {
                Err(Error::Busy) => core::hint::spin_loop(),
                other => break other?,
            }
        };

        self.wait_until_ready();
        self.collect(read)
    }

    /// Async [`transfer`](Self::transfer). Waits for the bus if another transaction is in
    /// flight; the results collected are always those of the transaction started here.
    pub async fn transfer_async(
        &self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error> {
        let _claim = loop {
            match self.try_claim(address, write, read.len()) {
                Err(Error::Busy) => self.vacant().await,
                other => break other?,
            }
        };

        self.finished().await;
        self.collect(read)
    }

    fn collect(&self, read: &mut [u8]) -> Result<(), Error> {
        match self.last_outcome().result() {
            Some(Ok(())) => {
                if !read.is_empty() {
                    self.read(read)?;
                }
                Ok(())
            }
            Some(Err(err)) => Err(err.into()),
            None => Err(Error::Busy),
        }
    }

    pub fn role(&self) -> Role {
        self.roles.get_role()
    }

    /// Bus errors and unexpected conditions seen so far.
    pub fn bus_errors(&self) -> u32 {
        self.bus_errors.load(Ordering::SeqCst)
    }

    pub fn last_bus_error(&self) -> Option<Event> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).last_bus_error)
    }

    /// Ends the master transaction and publishes its outcome.
    pub(crate) fn finish_master(
        &self,
        cs: CriticalSection,
        inner: &mut Inner<P, C, TXBUFSIZE, RXBUFSIZE>,
        outcome: Outcome,
    ) {
        inner.sync_own_address();
        inner.master.finish();
        inner.completed_at = Some(inner.clock.now_micros());

        self.outcome.store(outcome, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
        self.roles.set_role(cs, Role::Idle);
        inner.waiters.wake();

        match outcome {
            Outcome::Acknowledged => trace!("twi: transaction done"),
            _ => debug!("twi: transaction failed: {}", outcome),
        }
    }

    pub(crate) fn record_event(&self, cs: CriticalSection, event: Event) {
        let mut h = self.events_history.borrow_ref_mut(cs);
        if h.is_full() {
            h.pop_front();
        }
        let _ = h.push_back(event);
    }

    #[cfg(feature = "dump")]
    pub fn dump_state(&self) -> StateDump {
        let mut roles = [Role::Idle; ROLES_HISTORY_SIZE];
        let mut events = [Event::Unrecognized(crate::event::status::NO_INFO); EVENTS_HISTORY_SIZE];

        critical_section::with(|cs| {
            let roles_deque = self.roles.get_history(cs);
            deque_into_array(&roles_deque, &mut roles);

            let events_deque = self.events_history.borrow_ref(cs);
            deque_into_array(&events_deque, &mut events);
        });

        StateDump {
            role_history: roles,
            current_role: self.role(),
            event_history: events,
            busy: self.is_busy(),
            outcome: self.last_outcome(),
            bus_errors: self.bus_errors(),
        }
    }
}
