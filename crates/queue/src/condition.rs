// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Condition variable with deadline support.
//!
//! [`TimeoutCondition`] is used together with a caller-owned
//! [`parking_lot::Mutex`]. Waiting releases the guard, parks the thread and
//! reacquires the guard before returning. No predicate is checked internally,
//! so callers must loop on their own condition:
//!
//! ```ignore
//! let deadline = Deadline::after(timeout)?;
//! while state.is_empty() {
//!     if !cond.wait_or_timeout(&mut state, &deadline) {
//!         return EmptyQueueSnafu.fail();
//!     }
//! }
//! ```
//!
//! A [`Deadline`] is fixed when it is created. Reusing the same deadline
//! across iterations of a wait loop bounds the total time spent waiting by
//! the requested duration, no matter how many wakeups happen in between.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};
use snafu::OptionExt;

use crate::{Result, error::InvalidArgumentSnafu};

/// An absolute point in time that bounds one logical wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Start a deadline that expires `timeout` from now.
    ///
    /// Fails with `InvalidArgument` if the deadline is not representable.
    pub fn after(timeout: Duration) -> Result<Self> {
        let at = Instant::now()
            .checked_add(timeout)
            .context(InvalidArgumentSnafu {
                reason: format!("timeout {timeout:?} overflows the clock"),
            })?;
        Ok(Self { at })
    }

    #[must_use]
    pub const fn instant(&self) -> Instant { self.at }

    #[must_use]
    pub fn is_expired(&self) -> bool { Instant::now() >= self.at }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration { self.at.saturating_duration_since(Instant::now()) }
}

/// Condition variable shared by every waiter on one predicate.
///
/// All waiters of one condition must use the same mutex.
#[derive(Debug, Default)]
pub struct TimeoutCondition {
    cond: Condvar,
}

impl TimeoutCondition {
    #[must_use]
    pub const fn new() -> Self { Self { cond: Condvar::new() } }

    /// Release the guard, park until signalled, then reacquire the guard.
    ///
    /// May return spuriously.
    pub fn wait<T: ?Sized>(&self, guard: &mut MutexGuard<'_, T>) { self.cond.wait(guard); }

    /// Like [`wait`](Self::wait), but gives up once `deadline` passes.
    ///
    /// Returns `true` when woken before the deadline and `false` when the
    /// deadline expired. The guard is held again in both cases.
    pub fn wait_or_timeout<T: ?Sized>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        deadline: &Deadline,
    ) -> bool {
        !self.cond.wait_until(guard, deadline.instant()).timed_out()
    }

    /// Wake one parked waiter.
    ///
    /// A signal with nobody waiting is dropped, not remembered. Returns
    /// whether a waiter was woken.
    pub fn signal(&self) -> bool { self.cond.notify_one() }

    /// Wake every parked waiter, returning how many were woken.
    pub fn broadcast(&self) -> usize { self.cond.notify_all() }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    use parking_lot::Mutex;

    use super::*;

    struct Shared {
        ready: Mutex<bool>,
        cond:  TimeoutCondition,
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            ready: Mutex::new(false),
            cond:  TimeoutCondition::new(),
        })
    }

    #[test]
    fn test_signal_without_waiter_is_dropped() {
        let cond = TimeoutCondition::new();
        assert!(!cond.signal());
        assert_eq!(cond.broadcast(), 0);
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let shared = shared();
        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut ready = shared.ready.lock();
                while !*ready {
                    shared.cond.wait(&mut ready);
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        *shared.ready.lock() = true;
        shared.cond.signal();

        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_or_timeout_expires() {
        let shared = shared();
        let deadline = Deadline::after(Duration::from_millis(50)).unwrap();
        let start = Instant::now();

        let mut ready = shared.ready.lock();
        let woken = shared.cond.wait_or_timeout(&mut ready, &deadline);

        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_shared_deadline_bounds_total_wait() {
        let shared = shared();
        let stop = Arc::new(AtomicUsize::new(0));

        // Keep poking the condition without ever making the predicate true.
        let noise = {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while stop.load(Ordering::SeqCst) == 0 {
                    shared.cond.signal();
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let start = Instant::now();
        let deadline = Deadline::after(Duration::from_millis(100)).unwrap();
        let mut ready = shared.ready.lock();
        let mut timed_out = false;
        while !*ready {
            if !shared.cond.wait_or_timeout(&mut ready, &deadline) {
                timed_out = true;
                break;
            }
        }
        drop(ready);
        stop.store(1, Ordering::SeqCst);
        noise.join().unwrap();

        assert!(timed_out);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2), "waited {elapsed:?}");
    }

    #[test]
    fn test_broadcast_wakes_all() {
        let shared = shared();
        let woken = Arc::new(AtomicUsize::new(0));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let woken = Arc::clone(&woken);
                thread::spawn(move || {
                    let mut ready = shared.ready.lock();
                    while !*ready {
                        shared.cond.wait(&mut ready);
                    }
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        *shared.ready.lock() = true;
        shared.cond.broadcast();

        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_overflowing_deadline_rejected() {
        let err = Deadline::after(Duration::MAX).unwrap_err();
        assert!(matches!(err, crate::QueueError::InvalidArgument { .. }));
    }
}
