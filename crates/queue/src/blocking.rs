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

//! Bounded blocking queue over a pluggable [`StorageBackend`].
//!
//! The queue is a monitor: one mutex guards the backend, and two
//! [`TimeoutCondition`]s (`not_empty`, `not_full`) park callers whose
//! predicate does not hold. A successful `get` signals `not_full`, a
//! successful `put` signals `not_empty`.
//!
//! ## Blocking modes
//!
//! | `block` | `timeout`        | behaviour                                   |
//! |---------|------------------|---------------------------------------------|
//! | `false` | ignored          | fail immediately with `EmptyQueue`/`FullQueue` |
//! | `true`  | `Duration::ZERO` | wait as long as it takes                    |
//! | `true`  | `> 0`            | wait at most `timeout` in total             |
//!
//! There is no fairness among waiters: a signal wakes an arbitrary one.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use snafu::ensure;

use crate::{
    Result,
    backend::StorageBackend,
    condition::{Deadline, TimeoutCondition},
    error::{EmptyQueueSnafu, FullQueueSnafu},
};

/// Thread-safe FIFO with backpressure.
///
/// A `capacity` of zero means unbounded: `put` never waits.
pub struct BlockingQueue<B> {
    backend:   Mutex<B>,
    not_empty: TimeoutCondition,
    not_full:  TimeoutCondition,
    capacity:  usize,
}

impl<B: StorageBackend> BlockingQueue<B> {
    #[must_use]
    pub fn new(backend: B, capacity: usize) -> Self {
        Self {
            backend: Mutex::new(backend),
            not_empty: TimeoutCondition::new(),
            not_full: TimeoutCondition::new(),
            capacity,
        }
    }

    /// Remove the item at the head of the queue.
    ///
    /// Errors from the backend are returned as-is; in that case no item is
    /// consumed and no waiter is signalled.
    pub fn get(&self, block: bool, timeout: Duration) -> Result<B::Item> {
        let mut backend = self.backend.lock();

        if !block {
            ensure!(backend.size() > 0, EmptyQueueSnafu);
        } else if timeout.is_zero() {
            while backend.size() == 0 {
                self.not_empty.wait(&mut backend);
            }
        } else if backend.size() == 0 {
            let deadline = Deadline::after(timeout)?;
            while backend.size() == 0 {
                if !self.not_empty.wait_or_timeout(&mut backend, &deadline) {
                    return EmptyQueueSnafu.fail();
                }
            }
        }

        let item = backend.get()?;
        self.not_full.signal();
        Ok(item)
    }

    /// Append an item at the tail of the queue.
    pub fn put(&self, item: B::Item, block: bool, timeout: Duration) -> Result<()> {
        let mut backend = self.backend.lock();

        if self.capacity > 0 {
            if !block {
                ensure!(!self.at_capacity(&backend), FullQueueSnafu);
            } else if timeout.is_zero() {
                while self.at_capacity(&backend) {
                    self.not_full.wait(&mut backend);
                }
            } else if self.at_capacity(&backend) {
                let deadline = Deadline::after(timeout)?;
                while self.at_capacity(&backend) {
                    if !self.not_full.wait_or_timeout(&mut backend, &deadline) {
                        return FullQueueSnafu.fail();
                    }
                }
            }
        }

        backend.put(item)?;
        self.not_empty.signal();
        Ok(())
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize { self.backend.lock().size() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.backend.lock().size() == 0 }

    /// Whether a `put` would currently have to wait. Always false when
    /// unbounded.
    #[must_use]
    pub fn is_full(&self) -> bool {
        let backend = self.backend.lock();
        self.at_capacity(&backend)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Consume the queue and hand back its backend.
    pub fn into_inner(self) -> B { self.backend.into_inner() }

    fn at_capacity(&self, backend: &MutexGuard<'_, B>) -> bool {
        self.capacity > 0 && backend.size() >= self.capacity
    }
}
