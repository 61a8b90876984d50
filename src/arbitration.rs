//! Contention between our own slave engagement and our master requests.
//!
//! Both roles share one peripheral. While a slave exchange runs, master starts are held back;
//! when it ends, a held back (or interrupted) master transaction is restarted and the restart
//! is charged to the same budget as a lost arbitration.

/// Bounded attempt counter. A limit of 0 behaves like 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryBudget {
    used: u8,
    limit: u8,
}

impl RetryBudget {
    pub const fn new(limit: u8) -> Self {
        Self {
            used: 0,
            limit: if limit == 0 { 1 } else { limit },
        }
    }

    /// Records a failed attempt and tells whether another one is allowed.
    pub fn spend(&mut self) -> bool {
        self.used = self.used.saturating_add(1);
        self.used < self.limit
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn used(&self) -> u8 {
        self.used
    }
}

/// What to do with a master request right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Start,
    Defer,
}

/// What to do with a held back master transaction once the slave exchange is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resume {
    Restart,
    GiveUp,
}

#[derive(Debug)]
pub(crate) struct Coordinator {
    slave_blocking: bool,
}

impl Coordinator {
    pub const fn new() -> Self {
        Self {
            slave_blocking: false,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.slave_blocking
    }

    /// A slave exchange took the wire.
    pub fn block(&mut self) {
        self.slave_blocking = true;
    }

    pub fn release(&mut self) {
        self.slave_blocking = false;
    }

    pub fn admit(&self) -> Admission {
        if self.slave_blocking {
            Admission::Defer
        } else {
            Admission::Start
        }
    }

    /// The slave exchange ended while a master transaction was pending.
    pub fn resume(&mut self, arbitration: &mut RetryBudget) -> Resume {
        self.release();

        if arbitration.spend() {
            Resume::Restart
        } else {
            Resume::GiveUp
        }
    }
}
