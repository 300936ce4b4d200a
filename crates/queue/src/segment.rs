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

//! Segment file handles.
//!
//! A segment is written by exactly one [`SegmentWriter`] at a time and read
//! sequentially by at most one [`SegmentReader`]. Handles are opened lazily
//! by the log and dropped when the cursor moves to the next segment.

use std::{
    fs::{File, OpenOptions},
    io::{BufReader, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::{
    FlushMode, Result,
    error::{CorruptFrameSnafu, StorageIoSnafu},
    frame,
};

/// Append handle on one segment.
pub struct SegmentWriter {
    file:    Arc<File>,
    path:    PathBuf,
    /// Scratch buffer reused for encoding frames.
    buf:     BytesMut,
    segment: u64,
}

impl SegmentWriter {
    /// Open segment `segment` for appending at `offset`.
    ///
    /// At offset 0 the file is created, or truncated if it already exists.
    /// Otherwise the file must exist and hold at least `offset` bytes; any
    /// bytes past `offset` are discarded.
    pub fn open<P: AsRef<Path>>(path: P, segment: u64, offset: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = if offset == 0 {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .context(StorageIoSnafu { op: "create", path: &path })?
        } else {
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .context(StorageIoSnafu { op: "open", path: &path })?;
            let len = file
                .metadata()
                .context(StorageIoSnafu { op: "stat", path: &path })?
                .len();
            ensure!(
                len >= offset,
                CorruptFrameSnafu {
                    path: &path,
                    offset,
                    reason: format!("segment holds only {len} bytes"),
                }
            );
            if len > offset {
                warn!(path = ?path, offset, discarded = len - offset, "Discarding bytes past write cursor");
                file.set_len(offset)
                    .context(StorageIoSnafu { op: "truncate", path: &path })?;
            }
            file
        };

        file.seek(SeekFrom::Start(offset))
            .context(StorageIoSnafu { op: "seek", path: &path })?;

        debug!(path = ?path, segment, offset, "Opened segment for writing");

        Ok(Self {
            file: Arc::new(file),
            path,
            buf: BytesMut::new(),
            segment,
        })
    }

    /// Handle that can flush this segment from another thread.
    pub(crate) fn sync_handle(&self) -> SyncHandle {
        SyncHandle {
            file: self.file.clone(),
            path: self.path.clone(),
        }
    }

    /// Append one record, returning the number of bytes written.
    pub fn append(&mut self, payload: &[u8], flush_mode: FlushMode) -> Result<u64> {
        frame::encode(payload, &mut self.buf)?;
        let mut file: &File = &self.file;
        file.write_all(&self.buf)
            .context(StorageIoSnafu { op: "write", path: &self.path })?;
        if flush_mode == FlushMode::Sync {
            self.sync()?;
        }
        Ok(self.buf.len() as u64)
    }

    /// Flush the segment and close it.
    pub fn close(self) -> Result<()> {
        self.sync()?;
        debug!(path = ?self.path, segment = self.segment, "Closed segment");
        Ok(())
    }

    pub const fn segment(&self) -> u64 { self.segment }

    fn sync(&self) -> Result<()> {
        self.file
            .sync_data()
            .context(StorageIoSnafu { op: "sync", path: &self.path })
    }
}

/// Shared reference to a segment being written, used to force its data to
/// disk without going through the writer.
#[derive(Clone)]
pub(crate) struct SyncHandle {
    file: Arc<File>,
    path: PathBuf,
}

impl SyncHandle {
    pub(crate) fn sync(&self) -> Result<()> {
        self.file
            .sync_data()
            .context(StorageIoSnafu { op: "sync", path: &self.path })
    }
}

/// Sequential read handle on one segment.
pub struct SegmentReader {
    reader:  BufReader<File>,
    path:    PathBuf,
    segment: u64,
}

impl SegmentReader {
    /// Open segment `segment` read-only, positioned at `offset`.
    pub fn open<P: AsRef<Path>>(path: P, segment: u64, offset: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).context(StorageIoSnafu { op: "open", path: &path })?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .context(StorageIoSnafu { op: "seek", path: &path })?;
        }

        debug!(path = ?path, segment, offset, "Opened segment for reading");

        Ok(Self {
            reader: BufReader::new(file),
            path,
            segment,
        })
    }

    /// Decode the frame at `offset`, which must be the current position.
    ///
    /// Returns `Ok(None)` at a clean end of file.
    pub fn read_frame(&mut self, offset: u64) -> Result<Option<Bytes>> {
        frame::read_frame(&mut self.reader, &self.path, offset)
    }

    pub const fn segment(&self) -> u64 { self.segment }

    pub fn path(&self) -> &Path { &self.path }
}

/// Cut `path` down to `len` bytes if it is longer, returning how many bytes
/// were removed. A missing file counts as nothing to remove.
pub fn truncate_segment(path: &Path, len: u64) -> Result<u64> {
    let file = match OpenOptions::new().write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).context(StorageIoSnafu { op: "open", path }),
    };
    let current = file
        .metadata()
        .context(StorageIoSnafu { op: "stat", path })?
        .len();
    if current <= len {
        return Ok(0);
    }
    file.set_len(len)
        .context(StorageIoSnafu { op: "truncate", path })?;
    file.sync_all().context(StorageIoSnafu { op: "sync", path })?;
    Ok(current - len)
}
