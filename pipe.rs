/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A strictly synchronous, unbuffered rendezvous channel with separate
//! reader and writer endpoints.
//!
//! There is no in-flight value slot: a `write` only returns once its
//! matching `read` has copied the value out, and the `current_receiver`
//! slot tracked in [`ChannelState`] does triple duty — mutual exclusion
//! among receivers, the sender's copy destination, and the two-way
//! rendezvous signal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use log::trace;

use crate::copy::copy_value;
use crate::error::{lock_failed, ThreadError};
use crate::interrupt::Wakeable;
use crate::refcount::RefCounted;
use crate::thread;
use crate::value::Value;

/// Identifies one in-progress `read` call so a receiver can tell whether
/// its own slot ownership was cleared by a sender delivering a value, or
/// by someone else entirely (broken pipe, or — defensively — a different
/// receiver). A monotonically increasing counter stands in for the
/// pointer-identity check the native implementation uses (`current_receiver
/// == my_state`).
fn next_receiver_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

struct ChannelState {
    current_receiver: Option<u64>,
    /// Set by the sender once it has copied a value in for
    /// `current_receiver` to pick up.
    delivered: Option<Value>,
    rports: usize,
    wports: usize,
}

pub(crate) struct ChannelShared {
    inner: Mutex<ChannelState>,
    data_copied: Condvar,
    waiting_senders: Condvar,
    waiting_receivers: Condvar,
}

impl Wakeable for ChannelShared {
    fn wake(&self) {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        drop(guard);
        self.data_copied.notify_all();
        self.waiting_senders.notify_all();
        self.waiting_receivers.notify_all();
    }
}

/// Creates a new channel, returning its reader and writer endpoints.
pub fn pipe() -> (ReadPort, WritePort) {
    let shared = Arc::new(ChannelShared {
        inner: Mutex::new(ChannelState {
            current_receiver: None,
            delivered: None,
            rports: 1,
            wports: 1,
        }),
        data_copied: Condvar::new(),
        waiting_senders: Condvar::new(),
        waiting_receivers: Condvar::new(),
    });
    (
        ReadPort {
            shared: shared.clone(),
        },
        WritePort { shared },
    )
}

pub struct ReadPort {
    shared: Arc<ChannelShared>,
}

pub struct WritePort {
    shared: Arc<ChannelShared>,
}

impl ReadPort {
    pub(crate) fn copy_hook(&self) -> ReadPort {
        let mut state = self.shared.inner.lock().unwrap_or_else(|p| p.into_inner());
        state.rports += 1;
        ReadPort {
            shared: self.shared.clone(),
        }
    }

    /// Blocks until a writer delivers a value, or fails with
    /// [`ThreadError::BrokenPipe`] once every writer endpoint is gone.
    pub fn read(&self) -> Result<Value, ThreadError> {
        let thread = thread::current();
        let mut state = self.shared.inner.lock().map_err(lock_failed)?;

        while state.current_receiver.is_some() && state.wports > 0 {
            thread.check_interrupt()?;
            thread.publish_station(self.shared.clone());
            state = self.shared.waiting_receivers.wait(state).map_err(lock_failed)?;
            thread.clear_station();
        }
        if let Err(e) = thread.check_interrupt() {
            return Err(e);
        }
        if state.wports == 0 {
            return Err(ThreadError::BrokenPipe);
        }

        let my_token = next_receiver_token();
        state.current_receiver = Some(my_token);
        self.shared.waiting_senders.notify_all();

        // An interrupt observed here must not bail out directly: we have
        // already claimed `current_receiver`, so skipping the
        // clear-slot/notify cleanup below would leave the slot
        // permanently stuck on a dead token and wedge every future
        // `read` on this channel. Record the interrupt and fall through
        // to the shared cleanup path instead.
        let mut pending_interrupt = None;
        while state.current_receiver == Some(my_token) && state.wports > 0 {
            if let Err(e) = thread.check_interrupt() {
                pending_interrupt = Some(e);
                break;
            }
            thread.publish_station(self.shared.clone());
            state = self.shared.data_copied.wait(state).map_err(lock_failed)?;
            thread.clear_station();
        }

        if pending_interrupt.is_none() && state.current_receiver != Some(my_token) {
            // A sender delivered a value and cleared our slot.
            let value = state.delivered.take().expect("sender cleared slot without delivering");
            trace!("rendezvous read completed");
            return Ok(value);
        }

        // Either interrupted, or the last writer went away while we
        // waited: release our own slot before reporting the failure.
        state.current_receiver = None;
        self.shared.waiting_receivers.notify_all();
        drop(state);
        if let Some(e) = pending_interrupt {
            return Err(e);
        }
        Err(ThreadError::BrokenPipe)
    }
}

impl Drop for ReadPort {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.inner.lock() {
            state.rports -= 1;
            if state.rports == 0 {
                self.shared.waiting_senders.notify_all();
            }
        }
    }
}

impl RefCounted for ReadPort {
    fn ref_count(&self) -> usize {
        self.shared.ref_count()
    }
}

impl WritePort {
    pub(crate) fn copy_hook(&self) -> WritePort {
        let mut state = self.shared.inner.lock().unwrap_or_else(|p| p.into_inner());
        state.wports += 1;
        WritePort {
            shared: self.shared.clone(),
        }
    }

    /// Blocks until a reader is waiting and copies `value` to it, or
    /// fails with [`ThreadError::BrokenPipe`] once every reader endpoint
    /// is gone.
    ///
    /// Takes `value` by reference and runs it through the value-copy
    /// engine rather than moving it, so the caller's own binding stays
    /// usable afterwards — matching the design's "the source state is
    /// left untouched by a copy" semantics rather than Rust's usual
    /// channel-send-consumes-the-value idiom.
    pub fn write(&self, value: &Value) -> Result<(), ThreadError> {
        let thread = thread::current();
        let mut state = self.shared.inner.lock().map_err(lock_failed)?;

        while state.current_receiver.is_none() && state.rports > 0 {
            thread.check_interrupt()?;
            thread.publish_station(self.shared.clone());
            state = self.shared.waiting_senders.wait(state).map_err(lock_failed)?;
            thread.clear_station();
        }
        thread.check_interrupt()?;
        if state.rports == 0 {
            return Err(ThreadError::BrokenPipe);
        }

        // Copy failure must leave this side untouched: nothing has been
        // published into `state` yet, so propagating the error here
        // already satisfies that without any extra unwinding.
        let copied = copy_value(value)?;
        state.delivered = Some(copied);
        state.current_receiver = None;
        self.shared.data_copied.notify_all();
        self.shared.waiting_receivers.notify_all();
        trace!("rendezvous write completed");
        Ok(())
    }
}

impl Drop for WritePort {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.inner.lock() {
            state.wports -= 1;
            if state.wports == 0 {
                self.shared.data_copied.notify_all();
                self.shared.waiting_receivers.notify_all();
            }
        }
    }
}

impl RefCounted for WritePort {
    fn ref_count(&self) -> usize {
        self.shared.ref_count()
    }
}
