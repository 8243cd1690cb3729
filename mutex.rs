/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A reentrant-by-wrapper counting lock with interruptible acquisition.

use std::cell::Cell;
use std::sync::{Arc, Condvar, Mutex};

use log::trace;

use crate::error::{lock_failed, ThreadError};
use crate::interrupt::Wakeable;
use crate::refcount::RefCounted;
use crate::thread;

struct MutexState {
    /// Current recursive lock depth of whichever wrapper owns the lock.
    /// Zero means unlocked.
    count: usize,
}

pub(crate) struct MutexShared {
    inner: Mutex<MutexState>,
    unlocked: Condvar,
}

impl Wakeable for MutexShared {
    fn wake(&self) {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        drop(guard);
        self.unlocked.notify_all();
    }
}

/// A handle to a shared mutex. Reentrant for the specific wrapper that
/// locked it — another wrapper for the same backing, even from the same
/// OS thread, is treated as a contender, per the design's ownership
/// model: ownership is tracked per handle, not per OS thread.
pub struct MutexHandle {
    shared: Arc<MutexShared>,
    is_owner: Cell<bool>,
}

// MutexHandle is only ever driven from the single OS thread that holds
// it, so plain `Cell` is enough for `is_owner` — no atomics needed. It is
// still `Send` (but not `Sync`) automatically, which is exactly right: it
// can be captured whole by a spawned thread's entry closure or carried as
// a channel payload before a fresh wrapper is minted on the other side,
// but two OS threads can never touch the same wrapper concurrently.

impl MutexHandle {
    pub(crate) fn new() -> Self {
        MutexHandle {
            shared: Arc::new(MutexShared {
                inner: Mutex::new(MutexState { count: 0 }),
                unlocked: Condvar::new(),
            }),
            is_owner: Cell::new(false),
        }
    }

    /// The copy hook for the mutex handle kind: always mints a fresh,
    /// unowned wrapper around the same backing. Locking one copy never
    /// transfers ownership held by another.
    pub(crate) fn copy_hook(&self) -> MutexHandle {
        MutexHandle {
            shared: self.shared.clone(),
            is_owner: Cell::new(false),
        }
    }

    pub fn lock(&self) -> Result<(), ThreadError> {
        let thread = thread::current();
        thread.check_interrupt()?;
        let mut state = self.shared.inner.lock().map_err(lock_failed)?;
        while !self.is_owner.get() && state.count > 0 {
            thread.check_interrupt()?;
            thread.publish_station(self.shared.clone());
            state = self.shared.unlocked.wait(state).map_err(lock_failed)?;
            thread.clear_station();
        }
        thread.check_interrupt()?;
        self.is_owner.set(true);
        state.count += 1;
        trace!("mutex locked, depth {}", state.count);
        Ok(())
    }

    pub fn trylock(&self) -> Result<bool, ThreadError> {
        let thread = thread::current();
        thread.check_interrupt()?;
        let mut state = self.shared.inner.lock().map_err(lock_failed)?;
        if !self.is_owner.get() && state.count > 0 {
            return Ok(false);
        }
        self.is_owner.set(true);
        state.count += 1;
        Ok(true)
    }

    pub fn unlock(&self) -> Result<(), ThreadError> {
        let mut state = self.shared.inner.lock().map_err(lock_failed)?;
        if state.count == 0 {
            return Err(ThreadError::BadState("mutex is already unlocked"));
        }
        if !self.is_owner.get() {
            return Err(ThreadError::BadState("mutex is locked by another thread"));
        }
        state.count -= 1;
        if state.count == 0 {
            self.is_owner.set(false);
            self.shared.unlocked.notify_all();
        }
        Ok(())
    }
}

impl Drop for MutexHandle {
    fn drop(&mut self) {
        if self.is_owner.get() {
            if let Ok(mut state) = self.shared.inner.lock() {
                state.count = 0;
                self.shared.unlocked.notify_all();
            }
        }
    }
}

impl RefCounted for MutexHandle {
    fn ref_count(&self) -> usize {
        self.shared.ref_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread as os_thread;
    use std::time::Duration;

    #[test]
    fn reentrant_lock_nests() {
        let m = MutexHandle::new();
        m.lock().unwrap();
        m.lock().unwrap();
        m.unlock().unwrap(); // still held once more
        m.unlock().unwrap(); // now fully released
        assert!(m.unlock().is_err());
    }

    #[test]
    fn unowned_unlock_fails() {
        let m = MutexHandle::new();
        assert!(matches!(m.unlock(), Err(ThreadError::BadState(_))));
    }

    #[test]
    fn contention_blocks_other_wrapper() {
        let m = MutexHandle::new();
        m.lock().unwrap();

        let other = m.shared.clone();
        let handle = os_thread::spawn(move || {
            let contender = MutexHandle {
                shared: other,
                is_owner: Cell::new(false),
            };
            assert!(!contender.trylock().unwrap());
        });
        os_thread::sleep(Duration::from_millis(20));
        handle.join().unwrap();
        m.unlock().unwrap();
    }
}
