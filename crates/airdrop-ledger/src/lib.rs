//! # airdrop-ledger — Durable Distribution Ledger
//!
//! The ledger is the single source of truth for which addresses have been
//! paid. This crate persists it:
//!
//! - [`format`]: the versioned line format and the legacy free-form parser.
//! - [`store`]: the [`LedgerStore`] seam, with file and in-memory backends.
//! - [`journal`]: the in-flight journal guarding against resubmitting a
//!   batch whose confirmation was lost.
//!
//! ## Invariants
//!
//! - The ledger file is append-only. No operation in this crate truncates,
//!   rewrites, or reorders it.
//! - An append is durable (`sync_all`) before it returns.
//! - A missing ledger is an empty ledger; unreadable content is a warning
//!   and never causes data loss.
//!
//! Concurrent runs against the same ledger are not coordinated; one run at a
//! time is the deployment model.

pub mod error;
pub mod format;
pub mod journal;
pub mod store;

pub use error::LedgerError;
pub use format::{parse_ledger_text, render_record, render_v1, ParsedLedger, LEDGER_HEADER};
pub use journal::{InFlightBatch, InFlightJournal, JournalRecord};
pub use store::{
    FileLedgerStore, LedgerStore, LoadReport, LoadedLedger, MemoryLedgerStore, DEFAULT_LEDGER_FILE,
};
