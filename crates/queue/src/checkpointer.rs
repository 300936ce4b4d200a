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

//! Background checkpoint thread.
//!
//! ```text
//! ┌──────────────┐  publish   ┌─────────────────┐  persist   ┌──────────────┐
//! │  DiskQueue   │ ─────────► │ CheckpointState │ ◄───────── │ Checkpointer │
//! │ (put / get)  │  (locked)  │  latest snapshot│  (interval)│  (bg thread) │
//! └──────────────┘            └─────────────────┘            └──────────────┘
//! ```
//!
//! The queue publishes a complete snapshot after every committed operation,
//! so the thread never observes a half-updated cursor pair. Dropping the stop
//! channel ends the loop after one final persist.
//!
//! When appends are not synced individually, the segment being written is
//! registered with [`CheckpointState::track`] and flushed before every
//! persist. A durable checkpoint therefore never points past durable data.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::{
    Result,
    checkpoint::{Checkpoint, CheckpointStore},
    error::InternalSnafu,
    segment::SyncHandle,
};

/// Latest committed cursor snapshot plus the store it is persisted to.
pub(crate) struct CheckpointState {
    store:      CheckpointStore,
    latest:     Mutex<Checkpoint>,
    /// Open write segment whose appends have not been synced yet.
    unsynced:   Mutex<Option<SyncHandle>>,
    /// Serializes persists so an older snapshot never overwrites a newer one.
    persisting: Mutex<()>,
}

impl CheckpointState {
    pub(crate) fn new(store: CheckpointStore, initial: Checkpoint) -> Self {
        Self {
            store,
            latest: Mutex::new(initial),
            unsynced: Mutex::new(None),
            persisting: Mutex::new(()),
        }
    }

    pub(crate) fn publish(&self, checkpoint: Checkpoint) { *self.latest.lock() = checkpoint; }

    pub(crate) fn latest(&self) -> Checkpoint { *self.latest.lock() }

    pub(crate) fn store(&self) -> &CheckpointStore { &self.store }

    /// Set the segment to flush before each persist, `None` once it is
    /// closed.
    pub(crate) fn track(&self, segment: Option<SyncHandle>) { *self.unsynced.lock() = segment; }

    /// Write the latest snapshot to disk.
    ///
    /// Segments rolled away before the snapshot were synced when they were
    /// closed; the one still open is synced here, after the snapshot is
    /// taken.
    pub(crate) fn persist(&self) -> Result<Checkpoint> {
        let _guard = self.persisting.lock();
        let checkpoint = self.latest();
        let unsynced = self.unsynced.lock().clone();
        if let Some(segment) = unsynced {
            segment.sync()?;
        }
        self.store.persist(&checkpoint)?;
        Ok(checkpoint)
    }
}

/// Handle on the checkpoint thread. Stops and joins it on drop.
pub(crate) struct Checkpointer {
    /// Dropping the sender signals the thread to stop.
    stop_tx: Option<Sender<()>>,
    handle:  Option<JoinHandle<()>>,
}

impl Checkpointer {
    /// Start persisting `state` every `interval`, beginning immediately.
    pub(crate) fn spawn(state: Arc<CheckpointState>, interval: Duration, name: &str) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(format!("{name}-checkpoint"))
            .spawn(move || {
                info!(path = ?state.store().path(), ?interval, "Checkpointer starting");
                loop {
                    if let Err(e) = state.persist() {
                        error!(error = ?e, "Failed to persist checkpoint");
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                if let Err(e) = state.persist() {
                    error!(error = ?e, "Failed to persist final checkpoint");
                }
                info!("Checkpointer stopped");
            })
            .map_err(|e| {
                InternalSnafu {
                    message: format!("failed to spawn checkpoint thread: {e}"),
                }
                .build()
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle:  Some(handle),
        })
    }

    /// Signal the thread and wait for its final persist.
    pub(crate) fn stop(&mut self) -> Result<()> {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| {
                InternalSnafu {
                    message: "checkpoint thread panicked".to_string(),
                }
                .build()
            })?;
        }
        Ok(())
    }
}

impl Drop for Checkpointer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = ?e, "Checkpointer shutdown failed");
        }
    }
}
