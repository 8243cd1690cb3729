/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! End-to-end scenarios exercising more than one component together.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::thread as os_thread;
use std::time::Duration;

use tinylthread::{copy_value, mutex, pipe, thread, Handle, ThreadError, Value};

#[test]
fn ping_pong() {
    let (reader, writer) = pipe();
    let arg = Value::Handle(Handle::WritePort(writer));

    let child = thread(vec![arg], |mut args| {
        let writer = match args.remove(0) {
            Value::Handle(Handle::WritePort(w)) => w,
            _ => panic!("expected a write port"),
        };
        writer.write(&Value::Bytes(b"hello".to_vec())).unwrap();
        Vec::new()
    })
    .unwrap();

    let value = reader.read().unwrap();
    assert!(matches!(value, Value::Bytes(b) if b == b"hello"));

    let (finished_cleanly, results) = child.join().unwrap();
    assert!(finished_cleanly);
    assert!(results.is_empty());
}

#[test]
fn broken_pipe_on_dropped_writer() {
    let (reader, writer) = pipe();

    let child = thread(vec![Value::Handle(Handle::WritePort(writer))], |mut args| {
        // Take the write port out and immediately drop it: the only
        // writer endpoint goes away without ever writing.
        let _writer = args.remove(0);
        Vec::new()
    })
    .unwrap();

    let (finished_cleanly, _) = child.join().unwrap();
    assert!(finished_cleanly);

    assert!(matches!(reader.read(), Err(ThreadError::BrokenPipe)));
}

#[test]
fn concurrent_writers_rendezvous_in_either_order() {
    let (reader, writer_a) = pipe();
    let wrapped_a = Value::Handle(Handle::WritePort(writer_a));
    let writer_b = match copy_value(&wrapped_a).unwrap() {
        Value::Handle(Handle::WritePort(w)) => w,
        _ => unreachable!(),
    };
    let writer_a = match wrapped_a {
        Value::Handle(Handle::WritePort(w)) => w,
        _ => unreachable!(),
    };

    let child_a = thread(vec![Value::Handle(Handle::WritePort(writer_a))], |mut args| {
        let w = match args.remove(0) {
            Value::Handle(Handle::WritePort(w)) => w,
            _ => panic!("expected a write port"),
        };
        w.write(&Value::Int(1)).unwrap();
        Vec::new()
    })
    .unwrap();
    let child_b = thread(vec![Value::Handle(Handle::WritePort(writer_b))], |mut args| {
        let w = match args.remove(0) {
            Value::Handle(Handle::WritePort(w)) => w,
            _ => panic!("expected a write port"),
        };
        w.write(&Value::Int(2)).unwrap();
        Vec::new()
    })
    .unwrap();

    let mut seen = HashSet::new();
    for _ in 0..2 {
        match reader.read().unwrap() {
            Value::Int(n) => {
                seen.insert(n);
            }
            other => panic!("unexpected value: {:?}", other.type_name()),
        }
    }
    assert_eq!(seen, HashSet::from([1, 2]));

    child_a.join().unwrap();
    child_b.join().unwrap();
}

#[test]
fn interrupting_a_blocked_lock_unblocks_it() {
    let m = mutex();
    m.lock().unwrap();

    let wrapped = Value::Handle(Handle::Mutex(m));
    let contender_handle = match copy_value(&wrapped).unwrap() {
        Value::Handle(Handle::Mutex(h)) => h,
        _ => unreachable!(),
    };
    let m = match wrapped {
        Value::Handle(Handle::Mutex(h)) => h,
        _ => unreachable!(),
    };
    let child = thread(vec![Value::Handle(Handle::Mutex(contender_handle))], |mut args| {
        let m = match args.remove(0) {
            Value::Handle(Handle::Mutex(m)) => m,
            _ => panic!("expected a mutex"),
        };
        let err = m.lock().unwrap_err();
        Vec::from([Value::Bytes(err.kind_name().as_bytes().to_vec())])
    })
    .unwrap();

    // Give the child time to actually block in `lock`.
    os_thread::sleep(Duration::from_millis(30));
    child.interrupt().unwrap();

    let (finished_cleanly, results) = child.join().unwrap();
    assert!(finished_cleanly);
    match &results[0] {
        Value::Bytes(b) => assert_eq!(b, b"Interrupted"),
        other => panic!("unexpected result: {:?}", other.type_name()),
    }

    // The original holder's unlock still succeeds afterwards.
    m.unlock().unwrap();
}

#[test]
fn interrupting_a_blocked_read_does_not_wedge_the_channel() {
    let (reader, writer) = pipe();

    let wrapped = Value::Handle(Handle::ReadPort(reader));
    let reader_for_child = match copy_value(&wrapped).unwrap() {
        Value::Handle(Handle::ReadPort(r)) => r,
        _ => unreachable!(),
    };
    let reader = match wrapped {
        Value::Handle(Handle::ReadPort(r)) => r,
        _ => unreachable!(),
    };

    let blocked = thread(vec![Value::Handle(Handle::ReadPort(reader_for_child))], |mut args| {
        let r = match args.remove(0) {
            Value::Handle(Handle::ReadPort(r)) => r,
            _ => panic!("expected a read port"),
        };
        let err = r.read().unwrap_err();
        Vec::from([Value::Bytes(err.kind_name().as_bytes().to_vec())])
    })
    .unwrap();

    // Give the child time to actually claim the rendezvous slot and
    // block in its second wait.
    os_thread::sleep(Duration::from_millis(30));
    blocked.interrupt().unwrap();

    let (finished_cleanly, results) = blocked.join().unwrap();
    assert!(finished_cleanly);
    match &results[0] {
        Value::Bytes(b) => assert_eq!(b, b"Interrupted"),
        other => panic!("unexpected result: {:?}", other.type_name()),
    }

    // The interrupted read must have released `current_receiver`: a
    // fresh write from another thread still rendezvous with a read on
    // this channel, instead of blocking forever on a slot nobody will
    // ever clear. (Run the write concurrently: the channel is a true
    // rendezvous, so a same-thread write-then-read would deadlock.)
    let writer_thread = os_thread::spawn(move || writer.write(&Value::Int(7)).unwrap());
    assert!(matches!(reader.read().unwrap(), Value::Int(7)));
    writer_thread.join().unwrap();
}

#[test]
fn reentrant_lock_allows_nested_acquire_by_the_same_wrapper() {
    let m = mutex();
    m.lock().unwrap();
    m.lock().unwrap();

    let wrapped = Value::Handle(Handle::Mutex(m));
    let other = match copy_value(&wrapped).unwrap() {
        Value::Handle(Handle::Mutex(h)) => h,
        _ => unreachable!(),
    };
    let m = match wrapped {
        Value::Handle(Handle::Mutex(h)) => h,
        _ => unreachable!(),
    };
    assert!(!other.trylock().unwrap());

    m.unlock().unwrap(); // still held once more
    assert!(!other.trylock().unwrap());

    m.unlock().unwrap(); // now fully released
    assert!(other.trylock().unwrap());
}

#[test]
fn dropping_an_unjoined_thread_handle_panics() {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let _child = thread(Vec::new(), |_args| Vec::new()).unwrap();
        // Dropped here without join() or detach().
    }));
    assert!(result.is_err());
}
