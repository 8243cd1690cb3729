/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Spawn, detach, join and interrupt for the thread handle.

use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex};
use std::thread as os_thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::config::Config;
use crate::error::{lock_failed, ThreadError};
use crate::interrupt::{self, InterruptState, Wakeable};
use crate::refcount::RefCounted;
use crate::registry::{self, Registry};
use crate::value::{Handle, Value};

/// Everything a spawned thread's entry closure gets to call back into:
/// the copied arguments and a handle to run further blocking operations
/// against its own thread-shared state (`sleep`, `nointerrupt`, reading
/// its own interrupt flag). This is the Rust stand-in for "the already
/// loaded entry function running inside the child's own interpreter
/// state" — see `SPEC_FULL.md` §1 for why the entry point is a closure
/// rather than a source string.
pub type Entry = dyn FnOnce(Vec<Value>) -> Vec<Value> + Send;

struct JoinState {
    /// Non-null (`Some`) until the thread is joined; the joiner takes it
    /// out under the state mutex so a second, racing join observes
    /// "already joined" rather than taking the handle twice.
    os_handle: Option<os_thread::JoinHandle<()>>,
    finished: bool,
    panicked: bool,
    /// The entry closure's return values, moved here by the child right
    /// before it signals `finished_cv`, and taken out by whichever join
    /// call observes `finished == true` first.
    result: Vec<Value>,
}

pub(crate) struct ThreadShared {
    state: Mutex<InterruptState>,
    join: Mutex<JoinState>,
    finished_cv: Condvar,
    detached: Mutex<bool>,
    /// Parked on by this thread's own `sleep`; woken by `interrupt()`
    /// the same way every other blocking primitive's station is.
    sleep_lock: Mutex<()>,
    sleep_cv: Condvar,
    registry: Mutex<Registry>,
}

impl Wakeable for ThreadShared {
    fn wake(&self) {
        let guard = self.join.lock().unwrap_or_else(|p| p.into_inner());
        drop(guard);
        self.finished_cv.notify_all();
        let guard = self.sleep_lock.lock().unwrap_or_else(|p| p.into_inner());
        drop(guard);
        self.sleep_cv.notify_all();
    }
}

impl ThreadShared {
    fn new(os_handle: os_thread::JoinHandle<()>) -> Arc<Self> {
        Arc::new(ThreadShared {
            state: Mutex::new(InterruptState::new()),
            join: Mutex::new(JoinState {
                os_handle: Some(os_handle),
                finished: false,
                panicked: false,
                result: Vec::new(),
            }),
            finished_cv: Condvar::new(),
            detached: Mutex::new(false),
            sleep_lock: Mutex::new(()),
            sleep_cv: Condvar::new(),
            registry: Mutex::new(Registry::new()),
        })
    }

    /// Builds the bare shared state for the implicit main-thread context
    /// (or any OS thread that never went through `tinylthread::thread`).
    /// There is no real join handle for such a thread, so `join`/`detach`
    /// simply aren't reachable from a non-parent wrapper anyway.
    fn new_unmanaged() -> Arc<Self> {
        Arc::new(ThreadShared {
            state: Mutex::new(InterruptState::new()),
            join: Mutex::new(JoinState {
                os_handle: None,
                finished: false,
                panicked: false,
                result: Vec::new(),
            }),
            finished_cv: Condvar::new(),
            detached: Mutex::new(false),
            sleep_lock: Mutex::new(()),
            sleep_cv: Condvar::new(),
            registry: Mutex::new(Registry::new()),
        })
    }

    /// Blocks the calling thread for `duration`, or until interrupted.
    /// Follows the same publish/wait/clear/check discipline as every
    /// other blocking primitive, parked on a condition variable private
    /// to this thread's own shared state rather than a shared backing
    /// object — nothing else can ever be waiting on it.
    pub(crate) fn sleep_for(self: &Arc<Self>, duration: Duration) -> Result<(), ThreadError> {
        let deadline = Instant::now() + duration;
        let mut guard = self.sleep_lock.lock().map_err(lock_failed)?;
        loop {
            self.check_interrupt()?;
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.publish_station(self.clone());
            let (g, _timeout) = self
                .sleep_cv
                .wait_timeout(guard, deadline - now)
                .map_err(lock_failed)?;
            guard = g;
            self.clear_station();
        }
        self.check_interrupt()
    }

    pub(crate) fn check_interrupt(&self) -> Result<(), ThreadError> {
        self.state.lock().map_err(lock_failed)?.check()
    }

    pub(crate) fn publish_station(&self, station: Arc<dyn Wakeable>) {
        if let Ok(mut s) = self.state.lock() {
            s.publish(station);
        }
    }

    pub(crate) fn clear_station(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.clear_station();
        }
    }

    pub(crate) fn set_ignore_once(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.set_ignore_once();
        }
    }

    fn mark_finished(&self, panicked: bool, result: Vec<Value>) {
        if let Ok(mut j) = self.join.lock() {
            j.finished = true;
            j.panicked = panicked;
            j.result = result;
        }
        self.finished_cv.notify_all();
    }

    pub(crate) fn interrupt(&self) -> Result<(), ThreadError> {
        interrupt::deliver(&self.state)
    }

    /// Runs `f` against this thread's own registry under its lock.
    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut guard = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadShared>>> = RefCell::new(None);
}

/// A lightweight view onto the calling OS thread's own shared state.
/// Obtained fresh on every call — cheap, since it is just an `Arc` clone
/// out of thread-local storage.
pub(crate) fn current() -> Arc<ThreadShared> {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        if let Some(shared) = slot.as_ref() {
            return shared.clone();
        }
        let shared = ThreadShared::new_unmanaged();
        *slot = Some(shared.clone());
        shared
    })
}

fn set_current(shared: Arc<ThreadShared>) {
    CURRENT.with(|cell| *cell.borrow_mut() = Some(shared));
}

/// Suppresses the next interrupt check on the calling thread.
pub fn nointerrupt() {
    current().set_ignore_once();
}

/// A parent-thread handle, returned by [`crate::thread`]. Only the
/// wrapper created by the spawning call may `detach`, `join`, or raise
/// the "non-joined thread" error at destruction — a handle received by
/// copy (e.g. through a channel) is never a parent, matching the
/// design's "distinct wrapper roles" note.
pub struct ThreadHandle {
    shared: Arc<ThreadShared>,
    is_parent: bool,
}

impl ThreadHandle {
    /// Spawns a thread running `entry(args)` with a fresh, independent
    /// thread-local context. `args` are the already-copied initial
    /// arguments (copying happens in `tinylthread::thread`, before this
    /// is called, since it is a property of crossing the value-copy
    /// engine, not of thread lifecycle itself).
    pub(crate) fn spawn<F>(
        config: &Config,
        args: Vec<Value>,
        entry: F,
    ) -> Result<ThreadHandle, ThreadError>
    where
        F: FnOnce(Vec<Value>) -> Vec<Value> + Send + 'static,
    {
        let entry: Box<Entry> = Box::new(entry);
        // `ThreadShared` can only be built from the real `JoinHandle`,
        // which only exists once `Builder::spawn` returns — but the
        // spawned closure needs a clone of that same `ThreadShared` to
        // publish its own completion. A rendezvous channel breaks the
        // cycle: the child blocks on `ready_rx` for the handful of
        // instructions it takes the parent to construct `ThreadShared`
        // from the freshly returned `JoinHandle` and send it over.
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Arc<ThreadShared>>(0);
        let name = config.thread_name_prefix.clone();
        let builder = os_thread::Builder::new().name(name);
        let spawn_result = builder.spawn(move || {
            let shared = ready_rx.recv().expect("thread-shared handed off before thread body runs");
            set_current(shared.clone());
            // Seed the reserved `this` key with a non-parent handle onto
            // this very thread, so code running inside it can look
            // itself up. `thunk` is left as `Nil`: the entry closure
            // crossing the host-engine boundary has no representation
            // as a `Value` by design (see lib.rs's host-engine-boundary
            // note), so the reserved key exists without a payload.
            shared.with_registry(|r| {
                let this = ThreadHandle {
                    shared: shared.clone(),
                    is_parent: false,
                };
                r.set_reserved(registry::THIS, Value::Handle(Handle::Thread(this)));
                r.set_reserved(registry::THUNK, Value::Nil);
            });
            let (panicked, result) =
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| entry(args))) {
                    Ok(result) => (false, result),
                    Err(_) => (true, Vec::new()),
                };
            if panicked {
                warn!("tinylthread entry function panicked");
            }
            shared.mark_finished(panicked, result);
        });

        let os_handle = spawn_result.map_err(|_| ThreadError::MemoryError)?;
        let shared = ThreadShared::new(os_handle);
        ready_tx
            .send(shared.clone())
            .map_err(|_| ThreadError::MemoryError)?;
        debug!("spawned thread");
        Ok(ThreadHandle {
            shared,
            is_parent: true,
        })
    }

    /// The copy hook for the thread handle kind: a copied handle is
    /// never a parent wrapper, so it can never `detach`/`join`/raise the
    /// non-joined-thread error.
    pub(crate) fn copy_hook(&self) -> ThreadHandle {
        ThreadHandle {
            shared: self.shared.clone(),
            is_parent: false,
        }
    }

    pub fn detach(&self) -> Result<(), ThreadError> {
        if !self.is_parent {
            return Err(ThreadError::WrongRole);
        }
        let mut detached = self.shared.detached.lock().map_err(lock_failed)?;
        let join = self.shared.join.lock().map_err(lock_failed)?;
        if *detached {
            return Err(ThreadError::BadState("attempt to detach an already detached thread"));
        }
        if join.os_handle.is_none() {
            return Err(ThreadError::BadState("attempt to detach an already joined thread"));
        }
        *detached = true;
        trace!("thread detached");
        Ok(())
    }

    /// Blocks until the thread finishes, then returns whether it
    /// finished without panicking together with the entry closure's own
    /// return values. Interruptible: the join condition is a plain
    /// thread-local wait, so it goes through the same
    /// publish/wait/clear/check discipline as every other blocking
    /// primitive, even though the actual OS join underneath it is not
    /// interruptible once the child has already signalled completion.
    pub fn join(&self) -> Result<(bool, Vec<Value>), ThreadError> {
        if !self.is_parent {
            return Err(ThreadError::WrongRole);
        }
        if *self.shared.detached.lock().map_err(lock_failed)? {
            return Err(ThreadError::BadState("attempt to join an already detached thread"));
        }
        let thread = current();
        let mut guard = self.shared.join.lock().map_err(lock_failed)?;
        if guard.os_handle.is_none() && guard.finished {
            return Err(ThreadError::BadState("attempt to join an already joined thread"));
        }
        while !guard.finished {
            thread.check_interrupt()?;
            thread.publish_station(self.shared.clone());
            guard = self.shared.finished_cv.wait(guard).map_err(lock_failed)?;
            thread.clear_station();
        }
        thread.check_interrupt()?;
        let os_handle = guard.os_handle.take();
        let panicked = guard.panicked;
        let result = std::mem::take(&mut guard.result);
        drop(guard);
        if let Some(os_handle) = os_handle {
            let _ = os_handle.join();
        }
        debug!("joined thread, panicked={}", panicked);
        Ok((!panicked, result))
    }

    pub fn interrupt(&self) -> Result<(), ThreadError> {
        self.shared.interrupt()
    }
}

impl RefCounted for ThreadHandle {
    fn ref_count(&self) -> usize {
        self.shared.ref_count()
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        if !self.is_parent {
            return;
        }
        let detached = self.shared.detached.lock().map(|g| *g).unwrap_or(false);
        let joined = self
            .shared
            .join
            .lock()
            .map(|g| g.os_handle.is_none())
            .unwrap_or(true);
        if !detached && !joined {
            // `Drop` cannot return a `Result`, so the closest Rust
            // equivalent of "destruction raises an error" is a panic —
            // the same enforcement mechanism Rust's own guard types use
            // for "you must explicitly finish this before it goes out of
            // scope". Skipped while already unwinding to avoid aborting
            // the process on top of an existing panic.
            if !std::thread::panicking() {
                panic!("{}", ThreadError::NonJoinedThread);
            } else {
                warn!("thread handle dropped without being joined or detached (during unwind)");
            }
        }
    }
}
