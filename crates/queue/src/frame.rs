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

//! On-disk record format.
//!
//! Records are stored back to back in segment files:
//!
//! ```text
//! ┌─────────────────┬──────────────────────┐
//! │  Length (4B)    │   Payload (variable) │
//! │  big-endian i32 │   raw bytes          │
//! └─────────────────┴──────────────────────┘
//! ```
//!
//! There is no checksum and no padding. A frame that ends before its
//! declared length is a torn write and is reported as `CorruptFrame`.

use std::{
    io::{ErrorKind, Read},
    path::Path,
};

use bytes::{BufMut, Bytes, BytesMut};
use snafu::{ResultExt, ensure};

use crate::{
    Result,
    error::{CorruptFrameSnafu, InvalidArgumentSnafu, StorageIoSnafu},
};

/// Size of the length prefix in bytes.
pub(crate) const FRAME_HEADER_SIZE: usize = 4;

/// Largest payload a frame can describe.
pub(crate) const MAX_PAYLOAD_LEN: usize = i32::MAX as usize;

/// Total on-disk size of a frame carrying `payload_len` bytes.
#[inline]
pub(crate) const fn encoded_len(payload_len: usize) -> u64 { (FRAME_HEADER_SIZE + payload_len) as u64 }

/// Like [`encoded_len`], rejecting payloads a frame cannot describe.
pub(crate) fn frame_len(payload_len: usize) -> Result<u64> {
    ensure!(
        payload_len <= MAX_PAYLOAD_LEN,
        InvalidArgumentSnafu {
            reason: format!("payload of {payload_len} bytes exceeds the frame limit"),
        }
    );
    Ok(encoded_len(payload_len))
}

/// Encode one frame into `buf`, replacing its contents.
pub(crate) fn encode(payload: &[u8], buf: &mut BytesMut) -> Result<()> {
    frame_len(payload.len())?;
    buf.clear();
    buf.reserve(FRAME_HEADER_SIZE + payload.len());
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    buf.put_i32(payload.len() as i32);
    buf.put_slice(payload);
    Ok(())
}

/// Decode the next frame from `reader`.
///
/// Returns `Ok(None)` when the reader is exhausted exactly at a frame
/// boundary. `path` and `offset` only label errors.
pub(crate) fn read_frame<R: Read>(reader: &mut R, path: &Path, offset: u64) -> Result<Option<Bytes>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e).context(StorageIoSnafu { op: "read", path }),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    ensure!(
        filled == FRAME_HEADER_SIZE,
        CorruptFrameSnafu {
            path,
            offset,
            reason: format!("truncated length prefix ({filled} of {FRAME_HEADER_SIZE} bytes)"),
        }
    );

    let length = i32::from_be_bytes(header);
    ensure!(
        length >= 0,
        CorruptFrameSnafu {
            path,
            offset,
            reason: format!("negative record length {length}"),
        }
    );
    #[allow(clippy::cast_sign_loss)]
    let length = length as u64;

    // Grow the buffer with the data actually present instead of trusting
    // the length prefix for the allocation.
    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(length)
        .read_to_end(&mut payload)
        .context(StorageIoSnafu { op: "read", path })?;
    ensure!(
        payload.len() as u64 == length,
        CorruptFrameSnafu {
            path,
            offset,
            reason: format!("short payload ({} of {length} bytes)", payload.len()),
        }
    );

    Ok(Some(Bytes::from(payload)))
}
