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

//! Storage contract driven by [`BlockingQueue`](crate::BlockingQueue).

use std::collections::VecDeque;

use snafu::OptionExt;

use crate::{Result, error::EmptyStorageSnafu};

/// FIFO storage behind a blocking queue.
///
/// Implementations do no locking of their own. The blocking queue holds its
/// guard across every call, so a backend sees exactly one caller at a time.
pub trait StorageBackend {
    type Item;

    /// Append an item at the tail.
    fn put(&mut self, item: Self::Item) -> Result<()>;

    /// Remove and return the item at the head.
    ///
    /// Fails with `EmptyStorage` when nothing is stored.
    fn get(&mut self) -> Result<Self::Item>;

    /// Number of stored, unconsumed items.
    fn size(&self) -> usize;
}

/// Volatile backend keeping items in memory.
#[derive(Debug)]
pub struct MemoryBackend<T> {
    items: VecDeque<T>,
}

impl<T> MemoryBackend<T> {
    #[must_use]
    pub const fn new() -> Self { Self { items: VecDeque::new() } }
}

impl<T> Default for MemoryBackend<T> {
    fn default() -> Self { Self::new() }
}

impl<T> StorageBackend for MemoryBackend<T> {
    type Item = T;

    fn put(&mut self, item: T) -> Result<()> {
        self.items.push_back(item);
        Ok(())
    }

    fn get(&mut self) -> Result<T> { self.items.pop_front().context(EmptyStorageSnafu) }

    fn size(&self) -> usize { self.items.len() }
}
