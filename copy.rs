/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Deep-copies a value from one interpreter state to another.
//!
//! Scalars copy byte-for-byte. Tables without a metatable copy
//! shallow-recursively, with keys restricted to scalars and values
//! restricted to scalars or shareable handles — never another table,
//! which is exactly what keeps this routine from ever needing cycle
//! detection. Everything else arrives already tagged
//! [`RawValue::Unsupported`] by the host engine and fails with
//! [`ThreadError::UnsupportedType`].
//!
//! A shareable handle is copied by dispatching to its own *copy hook*: a
//! per-kind function that mints a fresh wrapper around the same backing
//! object, bumping its shared refcount. In the native implementation this
//! dispatch goes through a metatable lookup verified against the
//! destination's registry; here the dispatch is just a match on the
//! closed `Handle` enum, since a Rust sum type cannot suffer the
//! metatable-swap the native check guards against.

use crate::error::ThreadError;
use crate::value::{Handle, RawValue, Value};

fn copy_handle(handle: &Handle) -> Handle {
    match handle {
        Handle::Thread(t) => Handle::Thread(t.copy_hook()),
        Handle::Mutex(m) => Handle::Mutex(m.copy_hook()),
        Handle::ReadPort(p) => Handle::ReadPort(p.copy_hook()),
        Handle::WritePort(p) => Handle::WritePort(p.copy_hook()),
        Handle::Interrupt(i) => Handle::Interrupt(i.copy_hook()),
        Handle::External(h) => Handle::External(h.copy()),
    }
}

fn copy_at(value: &Value, index: usize) -> Result<Value, ThreadError> {
    match value {
        Value::Nil => Ok(Value::Nil),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
        Value::Table(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, val) in entries {
                if !key.is_scalar() {
                    return Err(ThreadError::UnsupportedType {
                        index,
                        type_name: key.type_name(),
                    });
                }
                if matches!(val, Value::Table(_)) {
                    return Err(ThreadError::UnsupportedType {
                        index,
                        type_name: "table",
                    });
                }
                let key = copy_at(key, index)?;
                let val = copy_at(val, index)?;
                out.push((key, val));
            }
            Ok(Value::Table(out))
        }
        Value::Handle(handle) => Ok(Value::Handle(copy_handle(handle))),
    }
}

/// Copies an already-typed value (no unsupported-type check needed: a
/// `Value` is by construction something this engine knows how to copy).
pub fn copy_value(value: &Value) -> Result<Value, ThreadError> {
    copy_at(value, 0)
}

/// Copies a value arriving straight from the host engine's stack at the
/// given 1-based argument index, producing the `UnsupportedType` error
/// with that index when the host reports something this engine cannot
/// copy.
pub fn copy_raw(value: &RawValue, index: usize) -> Result<Value, ThreadError> {
    match value {
        RawValue::Copyable(v) => copy_at(v, index),
        RawValue::Unsupported(type_name) => Err(ThreadError::UnsupportedType {
            index,
            type_name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::MutexHandle;

    #[test]
    fn scalars_round_trip() {
        let v = Value::Int(42);
        let copy = copy_value(&v).unwrap();
        assert!(matches!(copy, Value::Int(42)));
    }

    #[test]
    fn table_of_scalars_copies_deeply() {
        let v = Value::Table(vec![(Value::Bytes(b"k".to_vec()), Value::Int(1))]);
        let copy = copy_value(&v).unwrap();
        match copy {
            Value::Table(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(matches!(entries[0].1, Value::Int(1)));
            }
            _ => panic!("expected table"),
        }
    }

    #[test]
    fn nested_table_is_rejected() {
        let inner = Value::Table(vec![]);
        let v = Value::Table(vec![(Value::Int(1), inner)]);
        assert!(matches!(
            copy_value(&v),
            Err(ThreadError::UnsupportedType { type_name: "table", .. })
        ));
    }

    #[test]
    fn table_key_must_be_scalar() {
        let bad_key = Value::Table(vec![]);
        let v = Value::Table(vec![(bad_key, Value::Int(1))]);
        assert!(matches!(copy_value(&v), Err(ThreadError::UnsupportedType { .. })));
    }

    #[test]
    fn handle_copy_bumps_refcount_and_resets_ownership() {
        use crate::refcount::RefCounted;
        let m = MutexHandle::new();
        m.lock().unwrap();
        assert_eq!(m.ref_count(), 1);

        let first_copy = m.copy_hook();
        assert_eq!(m.ref_count(), 2);

        let value = Value::Handle(crate::value::Handle::Mutex(first_copy));
        let copied_value = copy_value(&value).unwrap();
        assert_eq!(m.ref_count(), 3);

        match copied_value {
            Value::Handle(crate::value::Handle::Mutex(copied)) => {
                // `m` still holds the lock; the copy is a distinct
                // contender and must not inherit that ownership.
                assert!(!copied.trylock().unwrap());
            }
            _ => panic!("expected mutex handle"),
        }

        drop(value);
        assert_eq!(m.ref_count(), 1);
    }

    #[test]
    fn unsupported_raw_value_reports_index_and_type() {
        let raw = RawValue::Unsupported("function");
        let err = copy_raw(&raw, 3).unwrap_err();
        match err {
            ThreadError::UnsupportedType { index, type_name } => {
                assert_eq!(index, 3);
                assert_eq!(type_name, "function");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
