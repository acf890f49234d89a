//! Retirement protocol
//!
//! Retiring an item is mark-then-drain:
//! 1. clear the item's active flag so new StartAccess calls fail against it
//! 2. wait until its reference count reaches zero
//! 3. only then rewrite or release its payload
//!
//! The wait parks on a condition variable. The reader that drops the last
//! pin of an inactive item wakes it. A timed wait bounds the cost of any
//! wakeup that races a re-activation. Once teardown starts, drains are
//! skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::item::Item;

/// Shared drain state for one table
pub struct Quiescence {
    lock: Mutex<()>,
    drained: Condvar,
    teardown: AtomicBool,
    poll: Duration,
}

impl Quiescence {
    pub(crate) fn new(poll: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            drained: Condvar::new(),
            teardown: AtomicBool::new(false),
            poll,
        }
    }

    /// Clear the active flag and block until no reader pins `item`.
    ///
    /// Returns false if the wait was cut short by teardown.
    pub(crate) fn retire(&self, item: &Item) -> bool {
        item.deactivate();
        self.drain(item)
    }

    /// Block until no reader pins `item`
    pub(crate) fn drain(&self, item: &Item) -> bool {
        if self.is_tearing_down() {
            return false;
        }
        if item.ref_count() == 0 {
            return true;
        }

        let mut guard = self.lock.lock();
        while item.ref_count() > 0 {
            if self.is_tearing_down() {
                return false;
            }
            self.drained.wait_for(&mut guard, self.poll);
        }
        true
    }

    /// Pin `item` only if it is still active.
    ///
    /// The pin is taken before the flag is checked, so a retiring item can
    /// never gain a reader after its drain observed zero.
    pub(crate) fn try_pin(&self, item: &Item) -> bool {
        item.pin();
        if item.is_active() {
            item.record_request();
            true
        } else {
            self.release(item);
            false
        }
    }

    /// Drop one pin, waking drains if this was the last pin of a retiring item
    pub(crate) fn release(&self, item: &Item) {
        let before = item.unpin();
        if before == 1 && !item.is_active() {
            let _guard = self.lock.lock();
            self.drained.notify_all();
        }
    }

    /// Set the teardown flag and wake every drain. Returns false if
    /// teardown had already begun.
    pub(crate) fn begin_teardown(&self) -> bool {
        let first = !self.teardown.swap(true, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.drained.notify_all();
        first
    }

    pub fn is_tearing_down(&self) -> bool {
        self.teardown.load(Ordering::SeqCst)
    }
}
