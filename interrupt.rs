/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The interrupt protocol: how one thread unblocks another out of
//! whatever it is currently waiting on.
//!
//! Every blocking primitive in this crate (`Mutex::lock`, `ReadPort::read`,
//! `WritePort::write`, `ThreadHandle::join`, `sleep`) follows the same
//! discipline: lock the backing's native mutex, loop while not interrupted
//! and the blocking condition still holds, publish where we're waiting
//! before each `wait`, clear it after, and check the interrupt flag
//! between waits.

use std::sync::{Arc, Mutex};

use crate::error::{lock_failed, ThreadError};

/// Something a thread can currently be blocked on: a mutex, a channel, or
/// another thread's completion (for `join`). `wake` must lock whatever
/// native mutex guards this object's condition variables and broadcast
/// all of them — broadcasting a condvar nobody is parked on is a no-op,
/// and the waiter's own loop already tolerates the resulting spurious
/// wakeup, so there is no need to track which of a backing's several
/// condition variables a given thread is parked on.
pub trait Wakeable: Send + Sync {
    fn wake(&self);
}

/// Per-thread interrupt bookkeeping, embedded in a thread's own shared
/// state behind that state's mutex.
pub struct InterruptState {
    interrupted: bool,
    ignore_once: bool,
    /// Where this thread is currently blocked, published right before
    /// each `wait` and cleared right after. Holding the `Arc` clone
    /// itself pins the backing object against destruction for as long as
    /// this thread might be interrupted into it — no separate refcount
    /// bump is needed the way the native implementation needs one.
    station: Option<Arc<dyn Wakeable>>,
}

impl InterruptState {
    pub(crate) fn new() -> Self {
        InterruptState {
            interrupted: false,
            ignore_once: false,
            station: None,
        }
    }

    /// Publishes where this thread is about to wait. Call immediately
    /// before each `Condvar::wait`.
    pub(crate) fn publish(&mut self, station: Arc<dyn Wakeable>) {
        self.station = Some(station);
    }

    /// Clears the published wait location. Call immediately after each
    /// `Condvar::wait` returns.
    pub(crate) fn clear_station(&mut self) {
        self.station = None;
    }

    /// Checks the interrupt flag, consuming a one-shot `ignore_once` mask
    /// instead of reporting the interrupt if it is set.
    pub(crate) fn check(&mut self) -> Result<(), ThreadError> {
        if self.interrupted {
            if self.ignore_once {
                self.ignore_once = false;
                self.interrupted = false;
                Ok(())
            } else {
                Err(ThreadError::Interrupted)
            }
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Sets the one-shot mask consumed by the next `check`.
    pub(crate) fn set_ignore_once(&mut self) {
        self.ignore_once = true;
    }
}

/// The distinguished, registry-scoped value thrown to unwind a thread out
/// of a blocking primitive. Its identity is all that matters — it carries
/// no state of its own, which is why it copies to another interpreter by
/// simply being looked up again rather than being reconstructed.
#[derive(Clone, Copy)]
pub struct InterruptSentinel;

impl InterruptSentinel {
    /// The interrupt sentinel's copy hook: unlike every other handle
    /// kind, it never dispatches through a registered copy hook function
    /// — it just re-resolves to the sentinel already installed in the
    /// destination's own registry.
    pub(crate) fn copy_hook(&self) -> InterruptSentinel {
        InterruptSentinel
    }
}

/// Delivers an interrupt to a thread identified by its `InterruptState`
/// mutex: sets the flag, and if the thread is currently blocked,
/// broadcasts it out of that wait.
///
/// The state mutex is released *before* the station is woken, exactly so
/// that waking a mutex/channel/thread never has to be taken while this
/// thread's own state mutex is held — the one documented exception to
/// the outer-to-inner lock order, confined to this function.
pub(crate) fn deliver(state: &Mutex<InterruptState>) -> Result<(), ThreadError> {
    let station = {
        let mut guard = state.lock().map_err(lock_failed)?;
        guard.interrupted = true;
        guard.station.clone()
    };
    if let Some(station) = station {
        station.wake();
    }
    Ok(())
}
