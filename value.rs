/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The closed set of data the value-copy engine understands.
//!
//! A real scripting engine's value type is much richer than this (it has
//! functions, coroutines, arbitrary userdata, tables with metatables...).
//! Those live on the host-engine side of the boundary described in
//! `SPEC_FULL.md` §1; what crosses into this crate is either something we
//! already know how to copy (`Value`) or a tagged placeholder saying "the
//! host had something here we don't understand" (`RawValue::Unsupported`).

use std::sync::Arc;

use crate::capi::ExternalHandle;
use crate::interrupt::InterruptSentinel;
use crate::mutex::MutexHandle;
use crate::pipe::{ReadPort, WritePort};
use crate::thread::ThreadHandle;

/// A value the copy engine knows how to move between two interpreter
/// states.
///
/// Deliberately not `Clone`: duplicating a handle must always go through
/// [`crate::copy::copy_value`] so its refcount bump and fresh-wrapper
/// construction actually happen, rather than happening implicitly behind
/// a derive.
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    /// A table without a metatable. Keys are restricted to scalars;
    /// values are scalars or shareable handles — never another table.
    /// That restriction is what rules out cycles, so no cycle detection
    /// is needed when copying one.
    Table(Vec<(Value, Value)>),
    Handle(Handle),
}

/// What actually arrives at the copy-engine boundary: either a `Value`
/// the host already converted, or a marker recording that the host saw
/// something with no copyable shape (a function, a coroutine, userdata
/// without a registered copy hook, a table with a metatable...).
pub enum RawValue {
    Copyable(Value),
    Unsupported(&'static str),
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        RawValue::Copyable(v)
    }
}

/// One of the four shareable handle kinds this crate defines. Each
/// variant owns exactly the wrapper type the corresponding module hands
/// out through the public API (`thread()`, `mutex()`, `pipe()`), so a
/// `Handle` found inside a `Value` *is* a live, usable wrapper — no
/// separate "in-flight" representation exists.
pub enum Handle {
    Thread(ThreadHandle),
    Mutex(MutexHandle),
    ReadPort(ReadPort),
    WritePort(WritePort),
    Interrupt(InterruptSentinel),
    /// A handle kind registered by a native extension through `c.api.v1`
    /// (see [`crate::capi`]), rather than one of this crate's own kinds.
    External(Arc<dyn ExternalHandle>),
}

impl Handle {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Handle::Thread(_) => "thread",
            Handle::Mutex(_) => "mutex",
            Handle::ReadPort(_) | Handle::WritePort(_) => "port",
            Handle::Interrupt(_) => "interrupt",
            Handle::External(h) => h.kind_name(),
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.kind_name())
    }
}

impl Value {
    /// Returns whether this value may appear as a table *key*: scalars
    /// only, per the design's table-copy restriction.
    pub(crate) fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Bytes(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "string",
            Value::Table(_) => "table",
            Value::Handle(h) => h.kind_name(),
        }
    }
}
