/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Error taxonomy shared by every blocking primitive in this crate.

/// Everything that can unwind a caller out of a blocking call.
///
/// Every variant is non-resumable: it is meant to propagate straight out
/// of the call that raised it. A handful of callers (`Mutex::unlock`,
/// `ThreadHandle::detach`) choose to keep the error as a `Result` instead
/// of treating it as exceptional; that is a property of those call
/// sites, not of this enum.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// Backing allocation failure, child-state creation failure, or a
    /// stack-extension failure during a copy.
    #[error("memory allocation error")]
    MemoryError,

    /// A native mutex or condition variable primitive reported failure.
    /// Treated as fatal on the call that observed it.
    #[error("native lock operation failed")]
    LockFailed,

    /// The value-copy engine encountered a value with no copyable shape.
    #[error("cannot copy value at index {index} (type: {type_name})")]
    UnsupportedType {
        index: usize,
        type_name: &'static str,
    },

    /// A wrapper whose backing has already been released was used.
    #[error("attempt to use invalid handle")]
    InvalidHandle,

    /// `detach`/`join` called from a wrapper that is not the thread's
    /// parent handle.
    #[error("operation requires the thread's parent handle")]
    WrongRole,

    /// `detach` of an already-detached or already-joined thread;
    /// `unlock` of a mutex that isn't locked, or locked by another
    /// wrapper; `sleep` given a negative or non-finite argument.
    #[error("{0}")]
    BadState(&'static str),

    /// `read`/`write` with no live counterpart endpoint.
    #[error("broken pipe")]
    BrokenPipe,

    /// The interrupt sentinel surfaced out of a blocking call.
    #[error("interrupted")]
    Interrupted,

    /// A parent thread handle was dropped without being joined or
    /// detached.
    #[error("thread was neither joined nor detached")]
    NonJoinedThread,
}

impl ThreadError {
    /// Name used by `type(v)` and diagnostics; not part of the public
    /// `Display` message.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ThreadError::MemoryError => "MemoryError",
            ThreadError::LockFailed => "LockFailed",
            ThreadError::UnsupportedType { .. } => "UnsupportedType",
            ThreadError::InvalidHandle => "InvalidHandle",
            ThreadError::WrongRole => "WrongRole",
            ThreadError::BadState(_) => "BadState",
            ThreadError::BrokenPipe => "BrokenPipe",
            ThreadError::Interrupted => "Interrupted",
            ThreadError::NonJoinedThread => "NonJoinedThread",
        }
    }
}

/// Converts a poisoned-lock observation into the one error kind this
/// crate uses for native-primitive failure. We treat a poisoned mutex
/// the same as a primitive reporting failure: both mean the lock's
/// protected invariants can no longer be trusted.
pub(crate) fn lock_failed<T>(_: std::sync::PoisonError<T>) -> ThreadError {
    ThreadError::LockFailed
}
