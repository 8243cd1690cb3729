/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Interruptible sleep and the one-shot interrupt mask.

use std::time::Duration;

use crate::error::ThreadError;
use crate::thread;

/// Blocks the calling thread for `seconds`, or until interrupted,
/// whichever comes first. `seconds` must be a non-negative, finite
/// number; anything else is rejected outright rather than silently
/// coerced into something sleepable.
pub fn sleep(seconds: f64) -> Result<(), ThreadError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ThreadError::BadState("sleep argument must be a non-negative number"));
    }
    thread::current().sleep_for(Duration::from_secs_f64(seconds))
}

/// Suppresses the next interrupt observed by the calling thread, whether
/// it is already pending or arrives before the next check. Grouped here
/// with `sleep` because both belong to the same "sleep & interrupt mask"
/// component; the underlying one-shot mask lives on the thread's own
/// shared state in `crate::thread`, which already has everything else
/// needed to flip it.
pub use crate::thread::nointerrupt;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_waits_at_least_the_requested_duration() {
        let start = Instant::now();
        sleep(0.02).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn zero_sleep_returns_immediately() {
        sleep(0.0).unwrap();
    }

    #[test]
    fn negative_sleep_is_rejected() {
        assert!(matches!(sleep(-1.0), Err(ThreadError::BadState(_))));
    }

    #[test]
    fn non_finite_sleep_is_rejected() {
        assert!(matches!(sleep(f64::NAN), Err(ThreadError::BadState(_))));
        assert!(matches!(sleep(f64::INFINITY), Err(ThreadError::BadState(_))));
    }
}
