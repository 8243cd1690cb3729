/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Preemptive OS threads, a reentrant mutex, and a synchronous
//! rendezvous channel for embedding alongside a single-threaded
//! scripting interpreter whose native state is not safe to share across
//! threads.
//!
//! Each spawned thread owns a fresh, independent interpreter state;
//! values cross thread boundaries only through the value-copy engine
//! ([`copy_value`]) or through one of the four shareable handle kinds
//! ([`Handle`]). Because the concrete scripting engine — its compiler,
//! garbage collector, and native value representation — is an external
//! collaborator outside this crate's scope, a spawned thread's entry
//! point is a plain Rust closure rather than a source string: "load
//! this source into bytecode" belongs to that engine's module loader,
//! not to the concurrency runtime. Every blocking discipline, error
//! kind and invariant below applies regardless of what, if anything,
//! sits on the other side of that boundary.

pub mod capi;
mod config;
mod copy;
mod error;
mod interrupt;
mod mutex;
mod pipe;
mod refcount;
mod registry;
mod sleep;
mod thread;
mod value;

pub use config::Config;
pub use copy::copy_value;
pub use error::ThreadError;
pub use mutex::MutexHandle;
pub use pipe::{pipe, ReadPort, WritePort};
pub use refcount::RefCounted;
pub use registry::{C_API_V1, INTERRUPT_ERROR, THIS, THUNK};
pub use sleep::{nointerrupt, sleep};
pub use thread::{Entry, ThreadHandle};
pub use value::{Handle, RawValue, Value};

/// Spawns a new OS thread running `entry(args)` against its own,
/// independent context, with the default [`Config`]. `args` are copied
/// through the value-copy engine before the child sees them, exactly as
/// any other value crossing a thread boundary is.
pub fn thread<F>(args: Vec<Value>, entry: F) -> Result<ThreadHandle, ThreadError>
where
    F: FnOnce(Vec<Value>) -> Vec<Value> + Send + 'static,
{
    thread_with_config(&Config::default(), args, entry)
}

/// As [`thread`], but with an explicit [`Config`] (currently just the OS
/// thread name prefix).
pub fn thread_with_config<F>(
    config: &Config,
    args: Vec<Value>,
    entry: F,
) -> Result<ThreadHandle, ThreadError>
where
    F: FnOnce(Vec<Value>) -> Vec<Value> + Send + 'static,
{
    let copied = args
        .iter()
        .map(copy_value)
        .collect::<Result<Vec<_>, _>>()?;
    ThreadHandle::spawn(config, copied, entry)
}

/// Creates a new, unlocked mutex.
pub fn mutex() -> MutexHandle {
    MutexHandle::new()
}

/// Returns the type name of one of this crate's four handle kinds
/// (`"thread"`, `"mutex"`, `"port"`, `"interrupt"`, or an extension's own
/// name registered through [`capi`]), or `None` for anything else.
pub fn type_of(value: &Value) -> Option<&'static str> {
    match value {
        Value::Handle(h) => Some(h.kind_name()),
        _ => None,
    }
}

/// Looks up one of the calling thread's own registry entries (see
/// [`registry`]), returning an independent copy of whatever value is
/// stored there.
pub fn registry_get(key: &str) -> Result<Option<Value>, ThreadError> {
    thread::current().with_registry(|r| match r.get(key) {
        Some(v) => copy_value(v).map(Some),
        None => Ok(None),
    })
}

/// Stores `value` under a non-reserved key in the calling thread's own
/// registry. Returns `Ok(false)` (not an error) if `key` names one of
/// the reserved entries.
pub fn registry_set(key: &str, value: Value) -> Result<bool, ThreadError> {
    let copied = copy_value(&value)?;
    Ok(thread::current().with_registry(|r| r.set(key, copied)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_of_reports_handle_kinds() {
        let m = mutex();
        let v = Value::Handle(Handle::Mutex(m));
        assert_eq!(type_of(&v), Some("mutex"));
        assert_eq!(type_of(&Value::Int(1)), None);
    }

    #[test]
    fn registry_round_trips_ordinary_keys() {
        registry_set("scratch", Value::Int(9)).unwrap();
        let got = registry_get("scratch").unwrap();
        assert!(matches!(got, Some(Value::Int(9))));
    }

    #[test]
    fn registry_interrupt_error_is_preseeded() {
        let got = registry_get(INTERRUPT_ERROR).unwrap();
        assert!(matches!(got, Some(Value::Handle(Handle::Interrupt(_)))));
    }
}
