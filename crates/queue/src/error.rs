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

use std::{io, path::PathBuf};

use snafu::Snafu;

/// Queue operation errors.
///
/// `EmptyQueue` and `FullQueue` are ordinary outcomes of a bounded queue and
/// are expected to be handled as control flow. Everything else reports a
/// storage or configuration problem.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// No item became available before the call gave up.
    #[snafu(display("Queue is empty"))]
    EmptyQueue,

    /// No capacity became available before the call gave up.
    #[snafu(display("Queue is full"))]
    FullQueue,

    /// The storage backend holds no unconsumed records.
    #[snafu(display("Storage is empty"))]
    EmptyStorage,

    #[snafu(display("Invalid argument: {reason}"))]
    InvalidArgument { reason: String },

    /// Filesystem failure on a segment or checkpoint file.
    #[snafu(display("Storage {op} failed on {}", path.display()))]
    StorageIo {
        op:     &'static str,
        path:   PathBuf,
        source: io::Error,
    },

    /// A record could not be decoded from its segment.
    #[snafu(display("Corrupt frame in {} at offset {offset}: {reason}", path.display()))]
    CorruptFrame {
        path:   PathBuf,
        offset: u64,
        reason: String,
    },

    #[snafu(display("Corrupt checkpoint {}: {reason}", path.display()))]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
}

impl QueueError {
    /// Returns true for [`QueueError::EmptyQueue`].
    #[must_use]
    pub const fn is_empty(&self) -> bool { matches!(self, Self::EmptyQueue) }

    /// Returns true for [`QueueError::FullQueue`].
    #[must_use]
    pub const fn is_full(&self) -> bool { matches!(self, Self::FullQueue) }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
