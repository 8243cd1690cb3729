/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A small, versioned escape hatch for native extensions embedded
//! alongside this crate that want to register their own shareable
//! handle kind without forking the copy engine.
//!
//! `c.api.v1` (see `SPEC_FULL.md` §6) exposes exactly enough surface for
//! an extension to wrap its own backing object in something the copy
//! engine can carry through a channel or a thread-spawn argument list:
//! implement [`ExternalHandle`], hand an instance to
//! [`Handle::External`](crate::value::Handle::External), and
//! [`crate::copy::copy_value`] will dispatch to it like any of this
//! crate's own handle kinds.

use std::sync::Arc;

/// A shareable handle kind defined outside this crate.
///
/// Implementors are expected to be cheap `Arc`-wrapped backing objects —
/// `copy` is the extension's own copy hook, called by the engine exactly
/// the way [`crate::mutex::MutexHandle::copy_hook`] is called for the
/// built-in kinds. It should mint a fresh wrapper around the same shared
/// backing rather than deep-copying, the same "bump a refcount, reset
/// any per-wrapper state" contract every built-in handle kind follows.
pub trait ExternalHandle: Send + Sync {
    /// A short, stable name for this handle kind, surfaced through
    /// [`crate::value::Value::type_name`] the same way `"mutex"` or
    /// `"port"` is for the built-in kinds.
    fn kind_name(&self) -> &'static str;

    /// Produces a fresh handle sharing this one's backing object.
    fn copy(&self) -> Arc<dyn ExternalHandle>;
}

/// Version 1 of the native extension surface: just enough to register a
/// handle kind and to look up the calling thread's own context.
///
/// This is a plain data struct rather than a trait object because
/// extensions are expected to hold it by value (it has no state of its
/// own to share) and call through it directly.
pub struct CApiV1 {
    /// Copies a handle that was registered through this API, the same
    /// way [`crate::copy::copy_value`] copies a built-in one.
    pub copy_hook: fn(&dyn ExternalHandle) -> Arc<dyn ExternalHandle>,
    /// Reports the current OS thread's own interrupt flag, for an
    /// extension that wants to honor cooperative interruption inside
    /// its own blocking calls.
    pub current_thread_interrupted: fn() -> bool,
}

fn copy_hook(handle: &dyn ExternalHandle) -> Arc<dyn ExternalHandle> {
    handle.copy()
}

fn current_thread_interrupted() -> bool {
    crate::thread::current().check_interrupt().is_err()
}

impl CApiV1 {
    pub fn get() -> &'static CApiV1 {
        static API: CApiV1 = CApiV1 {
            copy_hook,
            current_thread_interrupted,
        };
        &API
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::copy_value;
    use crate::value::{Handle, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandle {
        copies: Arc<AtomicUsize>,
    }

    impl ExternalHandle for CountingHandle {
        fn kind_name(&self) -> &'static str {
            "counting-handle"
        }

        fn copy(&self) -> Arc<dyn ExternalHandle> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            Arc::new(CountingHandle {
                copies: self.copies.clone(),
            })
        }
    }

    #[test]
    fn external_handle_round_trips_through_copy_engine() {
        let copies = Arc::new(AtomicUsize::new(0));
        let handle: Arc<dyn ExternalHandle> = Arc::new(CountingHandle {
            copies: copies.clone(),
        });
        let value = Value::Handle(Handle::External(handle));

        assert_eq!(value.type_name(), "counting-handle");

        let copied = copy_value(&value).unwrap();
        assert_eq!(copies.load(Ordering::SeqCst), 1);
        match copied {
            Value::Handle(Handle::External(h)) => assert_eq!(h.kind_name(), "counting-handle"),
            _ => panic!("expected external handle"),
        }
    }

    #[test]
    fn capi_v1_copy_hook_matches_direct_copy() {
        let copies = Arc::new(AtomicUsize::new(0));
        let handle: Arc<dyn ExternalHandle> = Arc::new(CountingHandle {
            copies: copies.clone(),
        });
        let api = CApiV1::get();
        let copied = (api.copy_hook)(&*handle);
        assert_eq!(copied.kind_name(), "counting-handle");
        assert_eq!(copies.load(Ordering::SeqCst), 1);
    }
}
