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

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ensure;

use crate::{Result, error::InvalidArgumentSnafu};

/// Default soft cap on the size of one segment file.
pub const DEFAULT_MAX_BYTES_PER_SEGMENT: u64 = 1_000_000;

/// Configuration for a disk-backed queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct QueueConfig {
    /// Prefix of every file this queue owns inside `data_dir`.
    #[default = "default"]
    pub name: String,

    /// Directory holding segment and checkpoint files. Created on open.
    #[default(PathBuf::from("./queue_data"))]
    pub data_dir: PathBuf,

    /// A segment is sealed once its size exceeds this many bytes. The record
    /// crossing the threshold is still written whole.
    #[default(DEFAULT_MAX_BYTES_PER_SEGMENT)]
    pub max_bytes_per_segment: u64,

    /// Maximum number of queued items, 0 for unbounded.
    #[default = 0]
    pub capacity: usize,

    /// How often the cursor checkpoint is persisted.
    #[default(Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub checkpoint_interval: Duration,

    pub flush_mode: FlushMode,
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.name.is_empty(),
            InvalidArgumentSnafu {
                reason: "queue name must not be empty",
            }
        );
        ensure!(
            !self.name.contains(['/', '\\']) && self.name != "." && self.name != "..",
            InvalidArgumentSnafu {
                reason: format!("queue name {:?} must not be a path", self.name),
            }
        );
        ensure!(
            self.max_bytes_per_segment > 0,
            InvalidArgumentSnafu {
                reason: "max_bytes_per_segment must be positive",
            }
        );
        ensure!(
            !self.checkpoint_interval.is_zero(),
            InvalidArgumentSnafu {
                reason: "checkpoint_interval must be positive",
            }
        );
        Ok(())
    }
}

/// When appended records are forced to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// Leave write-back to the OS.
    Async,
    /// `fdatasync` after every append.
    #[default]
    Sync,
}
