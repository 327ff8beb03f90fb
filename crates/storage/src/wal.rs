// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only write-ahead log
//!
//! One JSON line per entry. Appends are fsync'd before returning. Reading
//! stops at the first line that fails to parse or verify; everything
//! after it is treated as a torn write.
//!
//! A failed append is rolled back to the last committed length so later
//! entries never land behind a fragment. If the rollback itself fails the
//! log refuses further appends until it is reopened.

use crate::entry::WalEntry;
use dl_core::Operation;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAL is unusable after a failed rollback; reopen to recover")]
    Poisoned,
}

/// Injected write failure
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Half the entry reaches the file, then the write fails
    TornWrite,
    /// The whole entry is written but fsync fails
    SyncFailed,
    /// A torn write whose rollback also fails
    Unrecoverable,
}

/// Result of scanning a WAL file
#[derive(Debug, Default)]
pub struct Scan {
    pub entries: Vec<WalEntry>,
    /// Byte length of the valid prefix
    pub valid_len: u64,
    /// A torn or corrupt line was found after the valid prefix
    pub corrupt: bool,
}

impl Scan {
    pub fn last_sequence(&self) -> Option<u64> {
        self.entries.last().map(|e| e.sequence)
    }
}

/// WAL writer
pub struct Wal {
    path: PathBuf,
    file: File,
    next_sequence: u64,
    /// Byte length covered by committed entries
    committed_len: u64,
    poisoned: bool,
    #[cfg(any(test, feature = "test-support"))]
    fault: Option<Fault>,
}

impl Wal {
    /// Open or create the log.
    ///
    /// A corrupt tail is cut off so new entries are never written behind
    /// bytes that replay would stop at. Sequences start at 1 and never go
    /// below `floor + 1`, where `floor` is the sequence already covered by
    /// a snapshot.
    pub fn open(path: &Path, floor: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let scan = Self::scan(path)?;
        if scan.corrupt {
            tracing::warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                "truncating corrupt WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        let last = scan.last_sequence().unwrap_or(0).max(floor);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_sequence: last + 1,
            committed_len: scan.valid_len,
            poisoned: false,
            #[cfg(any(test, feature = "test-support"))]
            fault: None,
        })
    }

    /// Read every valid entry in order
    pub fn scan(path: &Path) -> Result<Scan, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Scan::default()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut scan = Scan::default();
        let mut line = String::new();

        loop {
            line.clear();
            let read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n as u64,
                Err(_) => {
                    scan.corrupt = true;
                    break;
                }
            };

            // A line without its newline was cut short mid-write
            if !line.ends_with('\n') {
                scan.corrupt = true;
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                scan.valid_len += read;
                continue;
            }

            match WalEntry::from_line(trimmed) {
                Ok(entry) if entry.verify() => {
                    scan.valid_len += read;
                    scan.entries.push(entry);
                }
                _ => {
                    scan.corrupt = true;
                    break;
                }
            }
        }

        Ok(scan)
    }

    /// Entries with a sequence greater than `after`
    pub fn replay(path: &Path, after: u64) -> Result<Scan, WalError> {
        let mut scan = Self::scan(path)?;
        scan.entries.retain(|e| e.sequence > after);
        Ok(scan)
    }

    /// Durably append one batch of operations.
    ///
    /// Returns the assigned sequence number. On error nothing of the batch
    /// stays in the file and its sequence is handed out again.
    pub fn append(&mut self, operations: &[Operation]) -> Result<u64, WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }

        let sequence = self.next_sequence;
        let entry = WalEntry::new(sequence, operations.to_vec());
        let mut line = entry.to_line()?;
        line.push('\n');

        // Bytes past the committed length are a fragment of an earlier failure
        let len = self.file.metadata()?.len();
        if len != self.committed_len {
            tracing::warn!(
                path = %self.path.display(),
                len,
                committed_len = self.committed_len,
                "cutting uncommitted WAL bytes before append"
            );
            self.rollback()?;
        }

        if let Err(e) = self.write_line(line.as_bytes()) {
            if let Err(rollback) = self.rollback() {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "WAL rollback failed; refusing further appends"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.committed_len += line.len() as u64;
        self.next_sequence += 1;
        Ok(sequence)
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        #[cfg(any(test, feature = "test-support"))]
        if let Some(fault) = self.fault {
            return match fault {
                Fault::TornWrite | Fault::Unrecoverable => {
                    self.file.write_all(&line[..line.len() / 2])?;
                    Err(std::io::Error::other("injected torn write"))
                }
                Fault::SyncFailed => {
                    self.file.write_all(line)?;
                    Err(std::io::Error::other("injected fsync failure"))
                }
            };
        }

        self.file.write_all(line)?;
        self.file.sync_all()
    }

    /// Cut the file back to the committed length
    fn rollback(&mut self) -> std::io::Result<()> {
        #[cfg(any(test, feature = "test-support"))]
        if self.fault == Some(Fault::Unrecoverable) {
            return Err(std::io::Error::other("injected rollback failure"));
        }

        self.file.set_len(self.committed_len)?;
        self.file.sync_all()
    }

    /// Make every following write fail as described until cleared
    #[cfg(any(test, feature = "test-support"))]
    pub fn inject_fault(&mut self, fault: Option<Fault>) {
        self.fault = fault;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Last sequence handed out (0 if none)
    pub fn sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    /// Drop every entry; sequence numbering continues
    pub fn truncate(&mut self) -> Result<(), WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.committed_len = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
