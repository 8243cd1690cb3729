/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Shared-ownership accounting for handle-backed objects.
//!
//! Every backing object (`MutexShared`, `ChannelShared`, `ThreadShared`)
//! lives behind an `Arc`, so the refcount header described by the design
//! is just `Arc`'s own strong count: it increments on every wrapper
//! creation and every in-flight copy, decrements on every drop, and the
//! backing is destroyed the instant it reaches zero. `RefCounted` gives
//! every handle kind a uniform way to read that count back out, which is
//! what the testable invariant in the design ("sum-of-live-wrappers
//! equals refcount at all observable points") actually checks.

use std::sync::Arc;

/// Uniform read-only view of a handle-backed object's live-wrapper count.
pub trait RefCounted {
    fn ref_count(&self) -> usize;
}

impl<T> RefCounted for Arc<T> {
    fn ref_count(&self) -> usize {
        Arc::strong_count(self)
    }
}
