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

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use uuid::Uuid;

use crate::{Result, error::StorageIoSnafu};

/// Generates a segment file name: `<name>.diskqueue.NNNNNN.dat`.
pub fn segment_file_name(name: &str, segment: u64) -> String {
    format!("{name}.diskqueue.{segment:06}.dat")
}

/// Generates the checkpoint file name: `<name>.diskqueue.meta.dat`.
pub fn checkpoint_file_name(name: &str) -> String { format!("{name}.diskqueue.meta.dat") }

/// Returns full path to a segment file: `dir/<name>.diskqueue.NNNNNN.dat`.
pub fn segment_file_path<P: AsRef<Path>>(dir: P, name: &str, segment: u64) -> PathBuf {
    dir.as_ref().join(segment_file_name(name, segment))
}

/// Returns full path to the checkpoint file.
pub fn checkpoint_file_path<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
    dir.as_ref().join(checkpoint_file_name(name))
}

/// Unique scratch path next to `target`: `<target>.<random>.tmp`.
pub fn temp_file_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    PathBuf::from(name)
}

/// Lists the indices of all segment files of queue `name` under `dir`,
/// sorted ascending.
pub fn scan_segments<P: AsRef<Path>>(dir: P, name: &str) -> Result<Vec<u64>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let prefix = format!("{name}.diskqueue.");
    let mut segments = Vec::new();
    let entries = std::fs::read_dir(dir).context(StorageIoSnafu {
        op:   "read_dir",
        path: dir,
    })?;

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let index = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".dat"))
            .filter(|digits| digits.len() >= 6 && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(index) = index {
            segments.push(index);
        }
    }

    segments.sort_unstable();
    Ok(segments)
}
