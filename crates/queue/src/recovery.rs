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

//! Crash recovery for the segment log.
//!
//! The checkpoint's read cursor marks the oldest unconsumed record; its size
//! and write cursor may be stale by up to one checkpoint interval. Recovery
//! therefore:
//! 1. Loads the checkpoint (or starts at segment 0, offset 0)
//! 2. Replays frames forward from the read cursor, counting intact records
//! 3. Follows a segment's end into the next segment file that exists
//! 4. Stops at the end of the last segment or at a torn frame
//! 5. Truncates that segment right after the last intact record
//!
//! Segment boundaries are taken from the files themselves, so a log written
//! with a different `max_bytes_per_segment` replays the same records.
//!
//! The returned [`Checkpoint`] holds the replayed size and the verified write
//! frontier. The read cursor only moves when it points past the data a crash
//! left behind.

use std::{fs, io::ErrorKind};

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    QueueConfig, QueueError, Result,
    checkpoint::{Checkpoint, CheckpointStore},
    cursor::SegmentCursor,
    error::StorageIoSnafu,
    frame,
    path::{scan_segments, segment_file_path},
    segment::{SegmentReader, truncate_segment},
};

/// Rebuild the log state of `config` from its checkpoint and segments.
pub fn recover(config: &QueueConfig, store: &CheckpointStore) -> Result<Checkpoint> {
    info!(dir = ?config.data_dir, name = %config.name, "Starting queue recovery");

    let stored = store.load()?;
    let start = match stored {
        Some(checkpoint) => {
            debug!(%checkpoint, "Loaded checkpoint");
            checkpoint
        }
        None => {
            info!("No checkpoint found, starting fresh");
            Checkpoint::default()
        }
    };

    let segments = scan_segments(&config.data_dir, &config.name)?;
    let read = clamp_read_cursor(config, start.read)?;
    let (size, end) = replay(config, read, segments.last().copied())?;

    let tail_path = segment_file_path(&config.data_dir, &config.name, end.segment);
    let discarded = truncate_segment(&tail_path, end.offset)?;
    if discarded > 0 {
        warn!(path = ?tail_path, offset = end.offset, discarded, "Discarded torn tail");
    }

    // The next put must not extend a segment that is already over the
    // current threshold.
    let write = if end.offset > config.max_bytes_per_segment {
        let next = end.next_segment();
        let path = segment_file_path(&config.data_dir, &config.name, next.segment);
        let discarded = truncate_segment(&path, 0)?;
        if discarded > 0 {
            warn!(path = ?path, discarded, "Discarded unreachable segment");
        }
        next
    } else {
        end
    };

    if stored.is_some() && start.size != size {
        warn!(
            checkpoint_size = start.size,
            replayed_size = size,
            "Checkpoint size is stale, using replayed size"
        );
    }

    let orphans = segments
        .iter()
        .filter(|segment| **segment > write.segment)
        .count();
    if orphans > 0 {
        warn!(orphans, last_segment = write.segment, "Ignoring segments past the write cursor");
    }

    let recovered = Checkpoint { size, read, write };
    info!(
        size,
        read_segment = recovered.read.segment,
        read_offset = recovered.read.offset,
        write_segment = recovered.write.segment,
        write_offset = recovered.write.offset,
        "Recovery complete"
    );
    Ok(recovered)
}

/// Move a read cursor that lies past the end of its segment to the start of
/// the next one.
///
/// A checkpoint persisted while appends were unsynced may reference bytes a
/// power loss never let reach the disk. Everything before the cursor was
/// already consumed, so the lost tail holds nothing to deliver.
fn clamp_read_cursor(config: &QueueConfig, read: SegmentCursor) -> Result<SegmentCursor> {
    if read.offset == 0 {
        return Ok(read);
    }
    let path = segment_file_path(&config.data_dir, &config.name, read.segment);
    let len = match fs::metadata(&path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => 0,
        Err(e) => return Err(e).context(StorageIoSnafu { op: "stat", path }),
    };
    if len >= read.offset {
        return Ok(read);
    }
    let next = read.next_segment();
    warn!(
        path = ?path,
        len,
        read_segment = read.segment,
        read_offset = read.offset,
        "Read cursor lies past the end of its segment, resuming at the next segment"
    );
    Ok(next)
}

/// Scan forward from `start`, returning the number of intact records and the
/// cursor right after the last one.
///
/// A clean end of data moves on to the next segment while `last_segment` lies
/// ahead; a missing segment or a torn frame ends the scan.
fn replay(
    config: &QueueConfig,
    start: SegmentCursor,
    last_segment: Option<u64>,
) -> Result<(u64, SegmentCursor)> {
    let mut cursor = start;
    let mut count = 0u64;
    let mut reader: Option<SegmentReader> = None;

    loop {
        let current = match reader.take() {
            Some(reader) if reader.segment() == cursor.segment => reader,
            _ => {
                let path = segment_file_path(&config.data_dir, &config.name, cursor.segment);
                match SegmentReader::open(&path, cursor.segment, cursor.offset) {
                    Ok(reader) => reader,
                    Err(QueueError::StorageIo { source, .. }) if source.kind() == ErrorKind::NotFound => {
                        debug!(path = ?path, "Segment not present, replay ends");
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        let current = reader.insert(current);

        match current.read_frame(cursor.offset) {
            Ok(Some(payload)) => {
                count += 1;
                cursor = cursor.step(frame::encoded_len(payload.len()));
            }
            Ok(None) if last_segment.is_some_and(|last| cursor.segment < last) => {
                debug!(segment = cursor.segment, offset = cursor.offset, "Segment exhausted");
                cursor = cursor.next_segment();
            }
            Ok(None) => break,
            Err(QueueError::CorruptFrame { path, offset, reason }) => {
                warn!(path = ?path, offset, %reason, "Torn frame found, replay stops here");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        records = count,
        segment = cursor.segment,
        offset = cursor.offset,
        "Replay complete"
    );
    Ok((count, cursor))
}
