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

/// Position inside the segment log.
///
/// Ordering is lexicographic on `(segment, offset)`, which is also log
/// order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentCursor {
    /// Index of the segment file.
    pub segment: u64,
    /// Byte offset within the segment.
    pub offset:  u64,
}

impl SegmentCursor {
    #[must_use]
    pub const fn new(segment: u64, offset: u64) -> Self { Self { segment, offset } }

    /// Cursor after a frame of `frame_len` bytes starting here.
    ///
    /// Rolls to the start of the next segment once the offset exceeds
    /// `max_bytes_per_segment`; the crossing frame stays in this segment.
    #[must_use]
    pub const fn advance(self, frame_len: u64, max_bytes_per_segment: u64) -> Self {
        let offset = self.offset + frame_len;
        if offset > max_bytes_per_segment {
            Self::new(self.segment + 1, 0)
        } else {
            Self::new(self.segment, offset)
        }
    }

    /// Cursor after a frame of `frame_len` bytes, staying in this segment.
    ///
    /// Readers use this instead of [`advance`](Self::advance): where a
    /// segment ends is decided by the writer that sealed it, not by the
    /// current threshold.
    #[must_use]
    pub const fn step(self, frame_len: u64) -> Self { Self::new(self.segment, self.offset + frame_len) }

    /// Start of the following segment.
    #[must_use]
    pub const fn next_segment(self) -> Self { Self::new(self.segment + 1, 0) }
}
