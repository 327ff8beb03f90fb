// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point-in-time state captures
//!
//! A snapshot records the full materialized state together with the last
//! WAL sequence it covers. It is written to a temporary file, fsync'd and
//! renamed into place, so a crash leaves either the old or the new one.

use crate::state::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    /// Last WAL sequence folded into `state`
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub state: MaterializedState,
}

impl Snapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(sequence: u64, state: MaterializedState) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            sequence,
            taken_at: Utc::now(),
            state,
        }
    }

    /// Load a snapshot; `Ok(None)` when none has been written yet
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        if snapshot.version != Self::CURRENT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: Self::CURRENT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
