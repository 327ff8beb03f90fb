// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL entry structure with checksum verification
//!
//! Each entry holds the operations of one handled event, a sequence number,
//! a timestamp and a CRC32 of the serialized operations.

use dl_core::Operation;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single entry in the write-ahead log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    /// Applied together or not at all
    pub operations: Vec<Operation>,
    /// CRC32 checksum of the serialized operations
    pub checksum: u32,
}

impl WalEntry {
    /// Create a new WAL entry with computed checksum
    pub fn new(sequence: u64, operations: Vec<Operation>) -> Self {
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let checksum = Self::calculate_checksum(&operations);
        Self {
            sequence,
            timestamp_micros,
            operations,
            checksum,
        }
    }

    fn calculate_checksum(operations: &[Operation]) -> u32 {
        // Operations hold only strings, dates and plain enums, so serialization
        // cannot fail; an empty string would fail verification anyway
        let json = serde_json::to_string(operations).unwrap_or_default();
        crc32fast::hash(json.as_bytes())
    }

    /// Verify the checksum matches the operations
    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.operations)
    }

    /// Serialize to newline-delimited JSON (one line)
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from a single line of JSON
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
