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

//! Cursor checkpoint for restart recovery.
//!
//! The checkpoint is one line of plain text:
//!
//! ```text
//! size,readSegment,readOffset,writeSegment,writeOffset
//! ```
//!
//! It is replaced atomically: the new content goes to
//! `<checkpoint>.<random>.tmp`, is synced, and is renamed over the old file.
//! A crash leaves either the previous or the new checkpoint in place, never
//! a mix.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    num::ParseIntError,
    path::{Path, PathBuf},
    str::FromStr,
};

use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, warn};

use crate::{
    Result,
    cursor::SegmentCursor,
    error::{CorruptCheckpointSnafu, StorageIoSnafu},
    path::{checkpoint_file_path, temp_file_path},
};

/// Snapshot of the log's cursors.
///
/// `size` is the number of records between `read` and `write` at the moment
/// the snapshot was taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub size:  u64,
    pub read:  SegmentCursor,
    pub write: SegmentCursor,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.size, self.read.segment, self.read.offset, self.write.segment, self.write.offset
        )
    }
}

/// Why a checkpoint line was rejected. The store attaches the file path.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseCheckpointError {
    #[snafu(display("invalid field {field:?}: {source}"))]
    InvalidField { field: String, source: ParseIntError },

    #[snafu(display("expected 5 fields, found {found}"))]
    FieldCount { found: usize },

    #[snafu(display("write cursor precedes read cursor"))]
    CursorOrder,
}

impl FromStr for Checkpoint {
    type Err = ParseCheckpointError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let fields = s
            .trim()
            .split(',')
            .map(|field| field.trim().parse::<u64>().context(InvalidFieldSnafu { field }))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let &[size, read_segment, read_offset, write_segment, write_offset] = fields.as_slice() else {
            return FieldCountSnafu { found: fields.len() }.fail();
        };

        let checkpoint = Self {
            size,
            read: SegmentCursor::new(read_segment, read_offset),
            write: SegmentCursor::new(write_segment, write_offset),
        };
        ensure!(checkpoint.read <= checkpoint.write, CursorOrderSnafu);
        Ok(checkpoint)
    }
}

/// Reads and atomically replaces the checkpoint file of one queue.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(dir: P, name: &str) -> Self {
        Self {
            path: checkpoint_file_path(dir, name),
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Load the last persisted checkpoint, `None` if there is none yet.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).context(StorageIoSnafu {
                    op:   "read",
                    path: &self.path,
                });
            }
        };

        let checkpoint = content
            .parse::<Checkpoint>()
            .map_err(|e| {
                CorruptCheckpointSnafu {
                    path:   &self.path,
                    reason: e.to_string(),
                }
                .build()
            })?;
        Ok(Some(checkpoint))
    }

    /// Durably replace the checkpoint file with `checkpoint`.
    pub fn persist(&self, checkpoint: &Checkpoint) -> Result<()> {
        let tmp_path = temp_file_path(&self.path);

        let written = Self::write_synced(&tmp_path, checkpoint);
        if written.is_err() {
            match fs::remove_file(&tmp_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?tmp_path, error = ?e, "Failed to remove temporary checkpoint"),
            }
        }
        written?;

        fs::rename(&tmp_path, &self.path).context(StorageIoSnafu {
            op:   "rename",
            path: &tmp_path,
        })?;
        sync_parent_dir(&self.path)?;

        debug!(path = ?self.path, %checkpoint, "Checkpoint persisted");
        Ok(())
    }

    fn write_synced(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .context(StorageIoSnafu { op: "create", path })?;
        write!(file, "{checkpoint}").context(StorageIoSnafu { op: "write", path })?;
        file.sync_all().context(StorageIoSnafu { op: "sync", path })
    }
}

/// Make a rename inside the parent of `path` durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(dir)
        .and_then(|dir| dir.sync_all())
        .context(StorageIoSnafu { op: "sync_dir", path: dir })
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> { Ok(()) }
