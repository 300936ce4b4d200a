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

//! Durable [`StorageBackend`] over a sequence of segment files.
//!
//! ## Architecture
//!
//! ```text
//!            put                                 get
//!             │                                   │
//!             ▼                                   ▼
//!     ┌──────────────┐                    ┌──────────────┐
//!     │ SegmentWriter│                    │ SegmentReader│
//!     │ write cursor │                    │ read cursor  │
//!     └──────┬───────┘                    └──────┬───────┘
//!            ▼                                   ▼
//!   jobs.diskqueue.000003.dat  ...  jobs.diskqueue.000001.dat
//!
//!                 jobs.diskqueue.meta.dat ◄── Checkpointer (bg thread)
//! ```
//!
//! A [`DiskQueue`] does no locking of its own. Share it between threads by
//! wrapping it in a [`BlockingQueue`](crate::BlockingQueue).

use std::{fs, path::PathBuf, sync::Arc};

use bytes::Bytes;
use snafu::{ResultExt, ensure};
use tracing::{debug, error, info, warn};

use crate::{
    FlushMode, QueueConfig, Result, StorageBackend,
    checkpoint::{Checkpoint, CheckpointStore},
    checkpointer::{CheckpointState, Checkpointer},
    cursor::SegmentCursor,
    error::{CorruptFrameSnafu, EmptyStorageSnafu, StorageIoSnafu},
    frame,
    path::segment_file_path,
    recovery,
    segment::{SegmentReader, SegmentWriter},
};

/// Persistent FIFO log of byte records.
pub struct DiskQueue {
    config:       QueueConfig,
    /// Records between `read` and `write`.
    size:         u64,
    read:         SegmentCursor,
    write:        SegmentCursor,
    /// Opened on first put, dropped when the write cursor rolls.
    writer:       Option<SegmentWriter>,
    /// Opened on first get, dropped when the read cursor rolls.
    reader:       Option<SegmentReader>,
    checkpoints:  Arc<CheckpointState>,
    checkpointer: Option<Checkpointer>,
}

impl DiskQueue {
    /// Open the queue described by `config`, recovering any existing state.
    ///
    /// Creates `data_dir` if needed and starts the checkpoint thread.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid config, `CorruptCheckpoint`
    /// when the checkpoint cannot be trusted, and `StorageIo` on filesystem
    /// failures.
    pub fn open(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir).context(StorageIoSnafu {
            op:   "create_dir",
            path: &config.data_dir,
        })?;

        let store = CheckpointStore::new(&config.data_dir, &config.name);
        let recovered = recovery::recover(&config, &store)?;

        let checkpoints = Arc::new(CheckpointState::new(store, recovered));
        let checkpointer = Checkpointer::spawn(
            checkpoints.clone(),
            config.checkpoint_interval,
            &config.name,
        )?;

        info!(
            dir = ?config.data_dir,
            name = %config.name,
            size = recovered.size,
            flush_mode = ?config.flush_mode,
            "Disk queue opened"
        );

        Ok(Self {
            config,
            size: recovered.size,
            read: recovered.read,
            write: recovered.write,
            writer: None,
            reader: None,
            checkpoints,
            checkpointer: Some(checkpointer),
        })
    }

    /// Persist the current cursors now, returning what was written.
    pub fn checkpoint(&self) -> Result<Checkpoint> { self.checkpoints.persist() }

    /// Flush the write segment, stop the checkpoint thread and write a final
    /// checkpoint.
    pub fn close(mut self) -> Result<()> { self.shutdown() }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig { &self.config }

    #[must_use]
    pub const fn read_cursor(&self) -> SegmentCursor { self.read }

    #[must_use]
    pub const fn write_cursor(&self) -> SegmentCursor { self.write }

    fn segment_path(&self, segment: u64) -> PathBuf {
        segment_file_path(&self.config.data_dir, &self.config.name, segment)
    }

    fn publish(&self) {
        self.checkpoints.publish(Checkpoint {
            size:  self.size,
            read:  self.read,
            write: self.write,
        });
    }

    /// Open the segment under the write cursor. Without per-append syncs the
    /// checkpointer flushes it before each persist.
    fn open_writer(&self) -> Result<SegmentWriter> {
        let writer = SegmentWriter::open(
            self.segment_path(self.write.segment),
            self.write.segment,
            self.write.offset,
        )?;
        if self.config.flush_mode == FlushMode::Async {
            self.checkpoints.track(Some(writer.sync_handle()));
        }
        Ok(writer)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.reader = None;
        let flushed = self.writer.take().map_or(Ok(()), SegmentWriter::close);
        let stopped = self
            .checkpointer
            .take()
            .map_or(Ok(()), |mut checkpointer| checkpointer.stop());
        flushed?;
        stopped?;

        info!(name = %self.config.name, size = self.size, "Disk queue closed");
        Ok(())
    }
}

impl StorageBackend for DiskQueue {
    type Item = Bytes;

    fn put(&mut self, item: Bytes) -> Result<()> {
        let frame_len = frame::frame_len(item.len())?;

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open_writer()?,
        };
        let writer = self.writer.insert(writer);
        if let Err(e) = writer.append(&item, self.config.flush_mode) {
            // Reopening seeks back to the cursor and drops the partial frame.
            self.writer = None;
            return Err(e);
        }

        let next = self.write.advance(frame_len, self.config.max_bytes_per_segment);
        if next.segment != self.write.segment {
            if let Some(writer) = self.writer.take() {
                match writer.close() {
                    Ok(()) => self.checkpoints.track(None),
                    Err(e) => {
                        warn!(error = ?e, segment = self.write.segment, "Failed to flush rolled segment");
                    }
                }
            }
            debug!(segment = next.segment, "Rolled write segment");
        }

        self.write = next;
        self.size += 1;
        self.publish();
        Ok(())
    }

    fn get(&mut self) -> Result<Bytes> {
        ensure!(self.size > 0 && self.read < self.write, EmptyStorageSnafu);

        // Segments are followed to their end on disk, wherever the writer
        // sealed them. The cursor only commits once a record is returned.
        let mut cursor = self.read;
        let payload = loop {
            let reader = match self.reader.take() {
                Some(reader) if reader.segment() == cursor.segment => reader,
                _ => SegmentReader::open(
                    self.segment_path(cursor.segment),
                    cursor.segment,
                    cursor.offset,
                )?,
            };
            let reader = self.reader.insert(reader);

            match reader.read_frame(cursor.offset) {
                Ok(Some(payload)) => break payload,
                Ok(None) if cursor.segment < self.write.segment => {
                    self.reader = None;
                    debug!(segment = cursor.segment, "Finished reading segment");
                    cursor = cursor.next_segment();
                }
                Ok(None) => {
                    let path = reader.path().to_path_buf();
                    self.reader = None;
                    return CorruptFrameSnafu {
                        path,
                        offset: cursor.offset,
                        reason: "segment ends before the write cursor",
                    }
                    .fail();
                }
                Err(e) => {
                    self.reader = None;
                    return Err(e);
                }
            }
        };

        self.read = cursor.step(frame::encoded_len(payload.len()));
        self.size -= 1;
        self.publish();
        Ok(payload)
    }

    fn size(&self) -> usize { usize::try_from(self.size).unwrap_or(usize::MAX) }
}

impl Drop for DiskQueue {
    fn drop(&mut self) {
        if self.checkpointer.is_some() {
            if let Err(e) = self.shutdown() {
                error!(error = ?e, name = %self.config.name, "Disk queue shutdown failed");
            }
        }
    }
}
