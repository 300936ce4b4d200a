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

use std::{path::PathBuf, time::Duration};

use crate::{BlockingQueue, DiskQueue, FlushMode, QueueConfig, Result};

/// Fluent construction of a disk-backed queue.
pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, data_dir: P) -> Self {
        Self {
            config: QueueConfig {
                name: name.into(),
                data_dir: data_dir.into(),
                ..Default::default()
            },
        }
    }

    /// Start from an existing configuration, e.g. one loaded from a file.
    pub const fn from_config(config: QueueConfig) -> Self { Self { config } }

    pub const fn max_bytes_per_segment(mut self, bytes: u64) -> Self {
        self.config.max_bytes_per_segment = bytes;
        self
    }

    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub const fn checkpoint_interval(mut self, interval: Duration) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    /// Open only the storage log, without the blocking wrapper.
    pub fn open_storage(self) -> Result<DiskQueue> { DiskQueue::open(self.config) }

    /// Open the log and wrap it in a [`BlockingQueue`] with the configured
    /// capacity.
    pub fn build(self) -> Result<BlockingQueue<DiskQueue>> {
        let capacity = self.config.capacity;
        Ok(BlockingQueue::new(DiskQueue::open(self.config)?, capacity))
    }
}
