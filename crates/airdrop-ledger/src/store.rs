//! # Ledger Store
//!
//! [`LedgerStore`] is the persistence seam the orchestrator writes through.
//! Two implementations:
//!
//! - [`FileLedgerStore`]: the durable, line-oriented ledger file.
//! - [`MemoryLedgerStore`]: process-local, for tests and dry runs.
//!
//! ## Durability
//!
//! `append` returns only after the new records are on disk (`sync_all`). A
//! record visible to `load()` in another process is therefore never lost
//! by a later crash of this one.
//!
//! ## Raw content preservation
//!
//! The file is only ever opened in append mode. Lines the parser could not
//! understand stay exactly where they were; they are reported, never
//! dropped.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use airdrop_core::{Ledger, LedgerEntry};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::LedgerError;
use crate::format::{parse_ledger_text, render_record, LEDGER_HEADER};
use crate::journal::InFlightJournal;

/// Default ledger file name, kept from the original deployment.
pub const DEFAULT_LEDGER_FILE: &str = "DISTRIBUTIONS.csv";

/// What `load()` found besides the entries themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Whether persisted state existed at all.
    pub existed: bool,
    /// Format version declared by the file header, if any.
    pub version: Option<u32>,
    /// Lines parsed through legacy address extraction.
    pub legacy_lines: usize,
    /// One-based numbers of lines that yielded no address.
    pub corrupt_lines: Vec<usize>,
    /// The file contained bytes that are not valid UTF-8.
    pub lossy_utf8: bool,
}

impl LoadReport {
    /// Whether extraction was best-effort (some content not understood).
    pub fn is_degraded(&self) -> bool {
        self.lossy_utf8 || !self.corrupt_lines.is_empty()
    }
}

/// A loaded ledger plus its load diagnostics.
#[derive(Debug, Clone, Default)]
pub struct LoadedLedger {
    pub ledger: Ledger,
    pub report: LoadReport,
}

/// Durable record of already-paid addresses.
///
/// Implementations must be `Send + Sync` so an orchestrator holding one can
/// live inside an async task.
pub trait LedgerStore: Send + Sync {
    /// Read the persisted ledger. Missing state is an empty ledger, not an error.
    fn load(&self) -> Result<LoadedLedger, LedgerError>;

    /// Durably append entries after all existing ones.
    ///
    /// Existing entries are never reordered or modified. An empty slice is a
    /// no-op.
    fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError>;

    /// Human-readable location, for logs and error messages.
    fn location(&self) -> String;
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn load(&self) -> Result<LoadedLedger, LedgerError> {
        (**self).load()
    }

    fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        (**self).append(entries)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Ledger stored in a plain-text file.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-flight journal that sits next to this ledger (`<file>.inflight`).
    pub fn journal(&self) -> InFlightJournal {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".inflight");
        InFlightJournal::file(PathBuf::from(name))
    }

    /// Whether appending needs a separating newline first.
    fn needs_leading_newline(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
        if len == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] != b'\n')
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<LoadedLedger, LedgerError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %self.path.display(),
                    "no distribution ledger found, starting from an empty ledger"
                );
                return Ok(LoadedLedger::default());
            }
            // Only absence means "nothing paid yet". Treating a file that exists
            // but cannot be read as empty would pay everyone again.
            Err(e) => return Err(LedgerError::io("read", &self.path, e)),
        };

        let (text, lossy_utf8) = match String::from_utf8(bytes) {
            Ok(s) => (s, false),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
        };

        let parsed = parse_ledger_text(&text);
        let report = LoadReport {
            existed: true,
            version: parsed.version,
            legacy_lines: parsed.legacy_lines,
            corrupt_lines: parsed.corrupt_lines,
            lossy_utf8,
        };

        if report.is_degraded() {
            tracing::warn!(
                path = %self.path.display(),
                corrupt_lines = ?report.corrupt_lines,
                lossy_utf8 = report.lossy_utf8,
                recovered_entries = parsed.entries.len(),
                "ledger contains content that could not be parsed; extraction is best-effort \
                 and the raw content is left untouched"
            );
        }

        tracing::debug!(
            path = %self.path.display(),
            entries = parsed.entries.len(),
            legacy_lines = report.legacy_lines,
            "loaded ledger"
        );

        Ok(LoadedLedger {
            ledger: Ledger::from_entries(parsed.entries),
            report,
        })
    }

    fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        if entries.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LedgerError::io("create_dir", parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io("open", &self.path, e))?;

        let len = file
            .metadata()
            .map_err(|e| LedgerError::io("stat", &self.path, e))?
            .len();

        let mut buf = String::new();
        if len == 0 {
            buf.push_str(LEDGER_HEADER);
            buf.push('\n');
        } else if Self::needs_leading_newline(&mut file, len)
            .map_err(|e| LedgerError::io("read", &self.path, e))?
        {
            buf.push('\n');
        }
        for entry in entries {
            buf.push_str(&render_record(entry));
            buf.push('\n');
        }

        file.write_all(buf.as_bytes())
            .map_err(|e| LedgerError::io("write", &self.path, e))?;
        file.sync_all()
            .map_err(|e| LedgerError::io("sync", &self.path, e))?;

        tracing::debug!(path = %self.path.display(), appended = entries.len(), "ledger append synced");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local ledger. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries.
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Snapshot of the current contents.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<LoadedLedger, LedgerError> {
        let entries = self.entries.lock().clone();
        Ok(LoadedLedger {
            report: LoadReport {
                existed: !entries.is_empty(),
                ..LoadReport::default()
            },
            ledger: Ledger::from_entries(entries),
        })
    }

    fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_core::{Address, ProofRef};

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn entry(n: u8, proof: &str) -> LedgerEntry {
        LedgerEntry::with_proofs(addr(n), vec![ProofRef::new(proof).unwrap()])
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("none.csv"));
        let loaded = store.load().unwrap();
        assert!(loaded.ledger.is_empty());
        assert!(!loaded.report.existed);
    }

    #[test]
    fn unreadable_ledger_is_an_error_not_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISTRIBUTIONS.csv");
        fs::create_dir(&path).unwrap();

        let err = FileLedgerStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LedgerError::Io { operation: "read", .. }));
    }

    #[test]
    fn append_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let store = FileLedgerStore::new(&path);
        store.append(&[entry(1, "0xaa")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(LEDGER_HEADER));
        let loaded = store.load().unwrap();
        assert_eq!(loaded.report.version, Some(1));
        assert_eq!(loaded.ledger.entries(), &[entry(1, "0xaa")]);
    }

    #[test]
    fn appends_accumulate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLedgerStore::new(dir.path().join("ledger.csv"));
        store.append(&[entry(1, "0xaa"), entry(2, "0xaa")]).unwrap();
        store.append(&[entry(3, "0xbb")]).unwrap();

        let loaded = store.load().unwrap();
        let order: Vec<_> = loaded.ledger.entries().iter().map(|e| e.address.clone()).collect();
        assert_eq!(order, vec![addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn empty_append_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        FileLedgerStore::new(&path).append(&[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn append_after_legacy_content_without_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISTRIBUTIONS.csv");
        let legacy = format!("{},\n{}", addr(1), addr(2));
        fs::write(&path, &legacy).unwrap();

        let store = FileLedgerStore::new(&path);
        store.append(&[entry(3, "0xcc")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&legacy), "legacy bytes must be preserved verbatim");
        let loaded = store.load().unwrap();
        assert_eq!(loaded.ledger.len(), 3);
        assert_eq!(loaded.ledger.entries()[2], entry(3, "0xcc"));
    }

    #[test]
    fn corrupt_content_is_reported_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(&path, format!("{}\n<<<binary junk>>>\n", addr(1))).unwrap();

        let store = FileLedgerStore::new(&path);
        let loaded = store.load().unwrap();
        assert!(loaded.report.is_degraded());
        assert_eq!(loaded.report.corrupt_lines, vec![2]);
        assert_eq!(loaded.ledger.len(), 1);

        store.append(&[entry(2, "0xdd")]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<<<binary junk>>>"));
    }

    #[test]
    fn non_utf8_bytes_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let mut bytes = format!("{}\n", addr(1)).into_bytes();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(format!("{}\n", addr(2)).as_bytes());
        fs::write(&path, bytes).unwrap();

        let loaded = FileLedgerStore::new(&path).load().unwrap();
        assert!(loaded.report.lossy_utf8);
        assert_eq!(loaded.ledger.len(), 2);
    }

    #[test]
    fn append_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.csv");
        FileLedgerStore::new(&path).append(&[entry(1, "0xaa")]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn journal_path_sits_next_to_ledger() {
        let store = FileLedgerStore::new("/var/lib/airdrop/DISTRIBUTIONS.csv");
        assert_eq!(
            store.journal().location(),
            "/var/lib/airdrop/DISTRIBUTIONS.csv.inflight"
        );
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryLedgerStore::new();
        assert!(!store.load().unwrap().report.existed);
        store.append(&[entry(1, "0xaa")]).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.report.existed);
        assert_eq!(loaded.ledger.len(), 1);
        assert_eq!(store.entries().len(), 1);
    }
}
