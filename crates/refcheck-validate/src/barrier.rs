//! Completion barrier for one file type's primary keys.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use refcheck_core::PrimaryKeySet;

enum BarrierState {
    Pending,
    Ready(Arc<PrimaryKeySet>),
    Abandoned,
}

/// Released once a type's primary-key set is complete, or abandoned when
/// its digest fails. Children block on it before their first row.
pub struct KeyBarrier {
    state: Mutex<BarrierState>,
    changed: Condvar,
}

impl Default for KeyBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyBarrier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BarrierState::Pending),
            changed: Condvar::new(),
        }
    }

    /// Guard that abandons the barrier unless it publishes first.
    pub fn publisher(&self) -> Publisher<'_> {
        Publisher {
            barrier: self,
            done: false,
        }
    }

    /// Blocks until the keys are published; `None` if abandoned.
    pub fn wait(&self) -> Option<Arc<PrimaryKeySet>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                BarrierState::Ready(keys) => return Some(Arc::clone(keys)),
                BarrierState::Abandoned => return None,
                BarrierState::Pending => {}
            }
            self.changed.wait(&mut state);
        }
    }

    fn settle(&self, next: BarrierState) {
        let mut state = self.state.lock();
        if matches!(*state, BarrierState::Pending) {
            *state = next;
            self.changed.notify_all();
        }
    }
}

pub struct Publisher<'a> {
    barrier: &'a KeyBarrier,
    done: bool,
}

impl Publisher<'_> {
    pub fn publish(mut self, keys: Arc<PrimaryKeySet>) {
        self.barrier.settle(BarrierState::Ready(keys));
        self.done = true;
    }
}

impl Drop for Publisher<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.barrier.settle(BarrierState::Abandoned);
        }
    }
}
