/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Spawns a child thread that writes one value down a pipe, reads it
//! back on the parent side, then joins.

use anyhow::Context;
use tinylthread::{pipe, thread, Handle, Value};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let (reader, writer) = pipe();
    let arg = Value::Handle(Handle::WritePort(writer));

    let child = thread(vec![arg], |mut args| {
        let writer = match args.remove(0) {
            Value::Handle(Handle::WritePort(w)) => w,
            _ => unreachable!("we only ever pass a write port in"),
        };
        writer
            .write(&Value::Bytes(b"hello from the child thread".to_vec()))
            .expect("write side of a fresh pipe cannot be broken yet");
        Vec::new()
    })
    .context("failed to spawn child thread")?;

    let received = reader.read().context("parent failed to read child's value")?;
    match received {
        Value::Bytes(bytes) => {
            println!("parent received: {}", String::from_utf8_lossy(&bytes));
        }
        other => println!("parent received unexpected value: {}", other.type_name()),
    }

    let (finished_cleanly, _) = child.join().context("failed to join child thread")?;
    println!("child finished cleanly: {finished_cleanly}");
    Ok(())
}
