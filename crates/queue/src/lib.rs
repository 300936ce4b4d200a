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

//! Bounded blocking queue with a durable segment-log backend.
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use blockqueue::QueueBuilder;
//! use bytes::Bytes;
//!
//! let queue = QueueBuilder::new("jobs", "/path/to/queue").capacity(1024).build()?;
//!
//! queue.put(Bytes::from_static(b"hello"), true, Duration::from_secs(1))?;
//! let item = queue.get(true, Duration::ZERO)?;
//!
//! // Clean shutdown flushes the log and writes a final checkpoint.
//! queue.into_inner().close()?;
//! ```

pub mod backend;
pub mod blocking;
pub mod builder;
pub mod checkpoint;
mod checkpointer;
pub mod condition;
pub mod config;
pub mod cursor;
pub mod disk;
pub mod error;
mod frame;
pub mod path;
mod recovery;
mod segment;

pub use backend::{MemoryBackend, StorageBackend};
pub use blocking::BlockingQueue;
pub use builder::QueueBuilder;
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use condition::{Deadline, TimeoutCondition};
pub use config::{DEFAULT_MAX_BYTES_PER_SEGMENT, FlushMode, QueueConfig};
pub use cursor::SegmentCursor;
pub use disk::DiskQueue;
pub use error::{QueueError, Result};
