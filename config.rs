/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Runtime tunables. There is no persisted or file-backed configuration —
//! spec.md §6 is explicit that this crate has no file formats or wire
//! protocols — so this is a plain `Default`-constructed struct, in the
//! style of `servo_config`'s option structs rather than a config-file
//! loader.

/// Tunables for the thread-lifecycle component.
#[derive(Clone, Debug)]
pub struct Config {
    /// Name given to every OS thread spawned through
    /// [`crate::thread`](crate::thread()), for debugger/profiler
    /// readability.
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            thread_name_prefix: "tinylthread".to_owned(),
        }
    }
}
