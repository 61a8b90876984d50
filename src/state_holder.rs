use core::cell::{Ref, RefCell};

use atomic::{Atomic, Ordering};
use critical_section::{CriticalSection, Mutex};
use heapless::Deque;

use crate::Role;

/// Wire owner, readable without a critical section, plus the last few role changes.
pub struct StateHolder<const HISTORY_SIZE: usize> {
    history: Mutex<RefCell<Deque<Role, HISTORY_SIZE>>>,
    role: Atomic<Role>,
}

impl<const HISTORY_SIZE: usize> StateHolder<HISTORY_SIZE> {
    pub const fn new() -> Self {
        Self {
            history: Mutex::new(RefCell::new(Deque::new())),
            role: Atomic::new(Role::Idle),
        }
    }

    pub fn set_role(&self, cs: CriticalSection, role: Role) {
        if self.get_role() != role {
            self.add_role_in_history(cs, role);
        }
        self.role.store(role, Ordering::SeqCst);
    }

    pub fn get_role(&self) -> Role {
        self.role.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn get_history<'cs>(
        &'cs self,
        cs: CriticalSection<'cs>,
    ) -> Ref<'cs, Deque<Role, HISTORY_SIZE>> {
        self.history.borrow_ref(cs)
    }

    fn add_role_in_history(&self, cs: CriticalSection, role: Role) {
        let mut h = self.history.borrow_ref_mut(cs);
        if h.is_full() {
            h.pop_front();
        }
        let _ = h.push_back(role);
    }
}
