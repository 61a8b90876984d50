#![allow(dead_code)]

use std::cell::{Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use twi_bus::{Directive, Event, Peripheral, TwiBus};

pub const COMPLETED_AT: u32 = 1234;

fn clock() -> u32 {
    COMPLETED_AT
}

/// Everything the controller did to the simulated peripheral.
#[derive(Debug, Default)]
pub struct Log {
    pub directives: Vec<Directive>,
    pub written: Vec<u8>,
    pub incoming: VecDeque<u8>,
    pub own_address: u8,
    pub own_address_writes: usize,
    pub frequency: u32,
    pub stop_pending: bool,
}

impl Log {
    pub fn count(&self, directive: Directive) -> usize {
        self.directives.iter().filter(|d| **d == directive).count()
    }

    pub fn last(&self) -> Option<Directive> {
        self.directives.last().copied()
    }
}

impl Peripheral for Log {
    fn set_frequency(&mut self, frequency: u32) {
        self.frequency = frequency;
    }

    fn write_data(&mut self, byte: u8) {
        self.written.push(byte);
    }

    fn read_data(&mut self) -> u8 {
        self.incoming.pop_front().unwrap_or(0xFF)
    }

    fn own_address(&self) -> u8 {
        self.own_address
    }

    fn set_own_address(&mut self, sla: u8) {
        self.own_address = sla;
        self.own_address_writes += 1;
    }

    fn stop_pending(&self) -> bool {
        self.stop_pending
    }

    fn proceed(&mut self, directive: Directive) {
        self.directives.push(directive);
    }
}

/// Forwards every peripheral call to the shared [`Log`]; `$lock` and `$lock_mut` borrow it.
macro_rules! forward_to_log {
    ($ty:ty, $lock:ident, $lock_mut:ident) => {
        impl Peripheral for $ty {
            fn set_frequency(&mut self, frequency: u32) {
                self.$lock_mut().set_frequency(frequency)
            }

            fn write_data(&mut self, byte: u8) {
                self.$lock_mut().write_data(byte)
            }

            fn read_data(&mut self) -> u8 {
                self.$lock_mut().read_data()
            }

            fn own_address(&self) -> u8 {
                self.$lock().own_address()
            }

            fn set_own_address(&mut self, sla: u8) {
                self.$lock_mut().set_own_address(sla)
            }

            fn stop_pending(&self) -> bool {
                self.$lock().stop_pending()
            }

            fn proceed(&mut self, directive: Directive) {
                self.$lock_mut().proceed(directive)
            }
        }
    };
}

/// Single threaded simulation, inspected through the returned `Rc`.
#[derive(Debug, Clone, Default)]
pub struct SimPeripheral(pub Rc<RefCell<Log>>);

impl SimPeripheral {
    fn log(&self) -> Ref<'_, Log> {
        self.0.borrow()
    }

    fn log_mut(&self) -> RefMut<'_, Log> {
        self.0.borrow_mut()
    }
}

forward_to_log!(SimPeripheral, log, log_mut);

/// Same simulation, shareable with a second thread.
#[derive(Debug, Clone, Default)]
pub struct SharedPeripheral(pub Arc<Mutex<Log>>);

impl SharedPeripheral {
    fn log(&self) -> MutexGuard<'_, Log> {
        self.0.lock().unwrap()
    }

    fn log_mut(&self) -> MutexGuard<'_, Log> {
        self.0.lock().unwrap()
    }
}

forward_to_log!(SharedPeripheral, log, log_mut);

pub type TestBus<P> = TwiBus<P, fn() -> u32, 8, 8>;
pub type Bus = TestBus<SimPeripheral>;
pub type SharedBus = TestBus<SharedPeripheral>;

pub fn bus() -> (Bus, Rc<RefCell<Log>>) {
    let sim = SimPeripheral::default();
    let log = sim.0.clone();
    (TwiBus::new(sim, clock as fn() -> u32), log)
}

pub fn shared_bus() -> (SharedBus, Arc<Mutex<Log>>) {
    let sim = SharedPeripheral::default();
    let log = sim.0.clone();
    (TwiBus::new(sim, clock as fn() -> u32), log)
}

pub fn feed<P: Peripheral>(bus: &TestBus<P>, events: &[Event]) {
    for event in events {
        bus.handle_event(*event);
    }
}

pub fn queue_incoming(log: &Rc<RefCell<Log>>, bytes: &[u8]) {
    log.borrow_mut().incoming.extend(bytes.iter().copied());
}
