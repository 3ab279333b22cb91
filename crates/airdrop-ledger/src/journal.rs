//! # In-Flight Journal
//!
//! A transfer that was broadcast but whose confirmation never arrived leaves
//! the ledger unchanged, so a naive rerun would pay the same batch again.
//! The journal closes that gap: before each transfer submission the
//! orchestrator records a `submitted` marker, after confirmation a
//! `confirmed` marker with the proof reference, and once the batch is
//! committed to the ledger the journal is cleared.
//!
//! A non-empty journal at run start therefore means "a batch may or may not
//! have been paid". [`InFlightJournal::pending`] summarizes it for the
//! operator, who resolves it by recording the batch as paid or discarding
//! the markers.
//!
//! The file is JSON lines, one [`JournalRecord`] per line, synced after every
//! write. A crash mid-write can leave an unterminated final line; readers
//! skip it if it does not parse, and the next write cuts it off before
//! appending. A malformed line anywhere else is an error.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use airdrop_core::{Address, ProofRef, TransferLeg};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JournalRecord {
    /// A transfer is about to be submitted.
    Submitted {
        run_id: Uuid,
        batch: usize,
        leg: TransferLeg,
        recipients: Vec<Address>,
        idempotency_key: String,
        at: DateTime<Utc>,
    },
    /// The transfer confirmed; the batch is not yet in the ledger.
    Confirmed {
        run_id: Uuid,
        batch: usize,
        leg: TransferLeg,
        proof: ProofRef,
        at: DateTime<Utc>,
    },
}

impl JournalRecord {
    fn key(&self) -> (Uuid, usize) {
        match self {
            Self::Submitted { run_id, batch, .. } | Self::Confirmed { run_id, batch, .. } => {
                (*run_id, *batch)
            }
        }
    }
}

/// Summary of one batch with unresolved journal records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightBatch {
    pub run_id: Uuid,
    pub batch: usize,
    pub recipients: Vec<Address>,
    /// Legs that were submitted.
    pub submitted: Vec<TransferLeg>,
    /// Legs that confirmed, with their proofs.
    pub confirmed: Vec<(TransferLeg, ProofRef)>,
    pub first_seen: DateTime<Utc>,
}

impl InFlightBatch {
    /// Proof references of confirmed legs, token leg first.
    pub fn confirmed_proofs(&self) -> Vec<ProofRef> {
        let mut legs = self.confirmed.clone();
        legs.sort_by_key(|(leg, _)| *leg != TransferLeg::Token);
        legs.into_iter().map(|(_, p)| p).collect()
    }

    /// Legs submitted but never confirmed.
    pub fn unconfirmed_legs(&self) -> Vec<TransferLeg> {
        self.submitted
            .iter()
            .copied()
            .filter(|leg| !self.confirmed.iter().any(|(c, _)| c == leg))
            .collect()
    }
}

#[derive(Debug)]
enum Backend {
    File(PathBuf),
    Memory(Mutex<Vec<JournalRecord>>),
}

/// Durable markers for transfers that are submitted but not yet committed.
#[derive(Debug)]
pub struct InFlightJournal {
    backend: Backend,
}

impl InFlightJournal {
    /// Journal persisted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
        }
    }

    /// Process-local journal.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(Vec::new())),
        }
    }

    pub fn location(&self) -> String {
        match &self.backend {
            Backend::File(p) => p.display().to_string(),
            Backend::Memory(_) => "memory".to_string(),
        }
    }

    /// Durably append one record.
    pub fn record(&self, record: &JournalRecord) -> Result<(), LedgerError> {
        match &self.backend {
            Backend::Memory(records) => {
                records.lock().push(record.clone());
                Ok(())
            }
            Backend::File(path) => {
                let mut line = serde_json::to_string(record).map_err(LedgerError::JournalEncode)?;
                line.push('\n');
                let mut file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create(true)
                    .open(path)
                    .map_err(|e| LedgerError::io("open", path, e))?;
                repair_tail(&mut file, path)?;
                file.write_all(line.as_bytes())
                    .map_err(|e| LedgerError::io("write", path, e))?;
                file.sync_all().map_err(|e| LedgerError::io("sync", path, e))
            }
        }
    }

    /// All records, oldest first. A missing file is an empty journal.
    pub fn records(&self) -> Result<Vec<JournalRecord>, LedgerError> {
        match &self.backend {
            Backend::Memory(records) => Ok(records.lock().clone()),
            Backend::File(path) => {
                let text = match fs::read_to_string(path) {
                    Ok(t) => t,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                    Err(e) => return Err(LedgerError::io("read", path, e)),
                };
                let torn_tail = !text.is_empty() && !text.ends_with('\n');
                let lines: Vec<&str> = text.lines().collect();
                let mut records = Vec::with_capacity(lines.len());
                for (i, line) in lines.iter().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str(line) {
                        Ok(record) => records.push(record),
                        Err(e) if torn_tail && i + 1 == lines.len() => {
                            tracing::warn!(
                                path = %path.display(),
                                line = i + 1,
                                error = %e,
                                "ignoring torn final journal line"
                            );
                        }
                        Err(source) => {
                            return Err(LedgerError::Journal {
                                path: path.clone(),
                                line: i + 1,
                                source,
                            })
                        }
                    }
                }
                Ok(records)
            }
        }
    }

    /// Unresolved batches, grouped by run and batch index.
    pub fn pending(&self) -> Result<Vec<InFlightBatch>, LedgerError> {
        let mut grouped: BTreeMap<(DateTime<Utc>, Uuid, usize), InFlightBatch> = BTreeMap::new();
        let mut order: BTreeMap<(Uuid, usize), DateTime<Utc>> = BTreeMap::new();

        for record in self.records()? {
            let key = record.key();
            let first_seen = match &record {
                JournalRecord::Submitted { at, .. } | JournalRecord::Confirmed { at, .. } => *at,
            };
            let first_seen = *order.entry(key).or_insert(first_seen);
            let entry = grouped
                .entry((first_seen, key.0, key.1))
                .or_insert_with(|| InFlightBatch {
                    run_id: key.0,
                    batch: key.1,
                    recipients: Vec::new(),
                    submitted: Vec::new(),
                    confirmed: Vec::new(),
                    first_seen,
                });
            match record {
                JournalRecord::Submitted {
                    leg, recipients, ..
                } => {
                    if entry.recipients.is_empty() {
                        entry.recipients = recipients;
                    }
                    if !entry.submitted.contains(&leg) {
                        entry.submitted.push(leg);
                    }
                }
                JournalRecord::Confirmed { leg, proof, .. } => {
                    entry.confirmed.push((leg, proof));
                }
            }
        }

        Ok(grouped.into_values().collect())
    }

    /// Whether any record is present.
    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.records()?.is_empty())
    }

    /// Drop every record. Clearing an absent journal is a no-op.
    pub fn clear(&self) -> Result<(), LedgerError> {
        match &self.backend {
            Backend::Memory(records) => {
                records.lock().clear();
                Ok(())
            }
            Backend::File(path) => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(LedgerError::io("remove", path, e)),
            },
        }
    }
}

/// Make sure the next append starts on a fresh line.
///
/// An unterminated tail that parses is a complete record missing only its
/// newline, so it is kept. Anything else is the remains of an interrupted
/// write and is truncated away.
fn repair_tail(file: &mut File, path: &Path) -> Result<(), LedgerError> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| LedgerError::io("read", path, e))?;
    if bytes.last().map_or(true, |b| *b == b'\n') {
        return Ok(());
    }
    let start = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    if serde_json::from_slice::<JournalRecord>(&bytes[start..]).is_ok() {
        return file
            .write_all(b"\n")
            .map_err(|e| LedgerError::io("write", path, e));
    }
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - start,
        "truncating torn final journal line"
    );
    file.set_len(start as u64)
        .map_err(|e| LedgerError::io("truncate", path, e))
}
