/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The small set of reserved keys every thread's context carries.
//!
//! A real embedding exposes these through the host interpreter's own
//! per-state registry table; here they are a plain map threaded through
//! a thread's own context, pre-populated at construction and immutable
//! at the reserved keys thereafter.

use std::collections::HashMap;

use crate::interrupt::InterruptSentinel;
use crate::value::{Handle, Value};

/// The calling thread's own handle, as seen by code running inside it.
pub const THIS: &str = "this";
/// The entry closure/arguments a spawned thread was started with.
pub const THUNK: &str = "thunk";
/// The distinguished sentinel thrown to unwind a thread out of a
/// blocking primitive; see [`crate::interrupt::InterruptSentinel`].
pub const INTERRUPT_ERROR: &str = "interrupt.error";
/// The name spec.md §6 reserves for the native-extension escape hatch.
/// Unlike the other three reserved names, this one is never populated as
/// a registry entry: a `CApiV1` is a table of function pointers with no
/// `Value` representation, so it is handed out directly by
/// [`crate::capi::CApiV1::get`] instead. The constant exists so the name
/// itself stays documented in one place; it is deliberately left out of
/// [`RESERVED`] below, since nothing ever seeds or blocks writes to it.
pub const C_API_V1: &str = "c.api.v1";

const RESERVED: &[&str] = &[THIS, THUNK, INTERRUPT_ERROR];

/// A per-thread table of named values, seeded with the reserved keys
/// every thread's context carries and otherwise free for a caller to use
/// as ordinary storage.
pub struct Registry {
    entries: HashMap<String, Value>,
}

impl Registry {
    /// Builds a fresh registry for a thread, seeding the reserved keys
    /// that do not depend on anything the caller supplies.
    pub(crate) fn new() -> Registry {
        let mut entries = HashMap::new();
        entries.insert(
            INTERRUPT_ERROR.to_owned(),
            Value::Handle(Handle::Interrupt(InterruptSentinel)),
        );
        Registry { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Sets a non-reserved key. Returns `false` without modifying
    /// anything if `key` is one of the reserved names — callers decide
    /// whether that is an error worth surfacing at their own API
    /// surface; this layer just refuses to let it happen silently.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if RESERVED.contains(&key) {
            return false;
        }
        self.entries.insert(key.to_owned(), value);
        true
    }

    pub(crate) fn set_reserved(&mut self, key: &'static str, value: Value) {
        debug_assert!(RESERVED.contains(&key));
        self.entries.insert(key.to_owned(), value);
    }
}
