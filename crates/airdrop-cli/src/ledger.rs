//! # Ledger Subcommands
//!
//! - `show` prints every entry with its proof references.
//! - `verify` reports unparseable lines, duplicate addresses, and pending
//!   in-flight batches, exiting non-zero if it finds any.
//! - `export --out PATH` writes the ledger in the v1 format to a new file.
//!   The live ledger is never rewritten in place.
//! - `resolve --paid|--unpaid` settles in-flight batches left behind by an
//!   interrupted run.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use airdrop_core::{Address, ProofRef};
use airdrop_distributor::resolve_paid;
use airdrop_ledger::{render_v1, FileLedgerStore, LedgerError, LedgerStore};
use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Subcommand};

use crate::settings::ConfigArgs;
use crate::{EXIT_FAILURE, EXIT_OK};

/// Arguments for `airdrop ledger`.
#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Print ledger entries.
    Show {
        /// Print entries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check the ledger for damage and unresolved in-flight batches.
    Verify,

    /// Write the ledger in the current format to a new file.
    Export {
        /// Destination path. Must not exist.
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
    },

    /// Settle in-flight batches left by an interrupted run.
    Resolve(ResolveArgs),
}

/// Arguments for `airdrop ledger resolve`.
#[derive(Args, Debug, Clone, Default)]
#[command(group(ArgGroup::new("outcome").required(true).args(["paid", "unpaid"])))]
pub struct ResolveArgs {
    /// The transfers went through: record the recipients as paid.
    #[arg(long)]
    pub paid: bool,

    /// The transfers never happened: discard the in-flight markers.
    #[arg(long)]
    pub unpaid: bool,

    /// Proof reference (transaction hash) of a transfer that paid the batch.
    /// May be repeated.
    #[arg(long = "proof", value_name = "PROOF")]
    pub proofs: Vec<String>,
}

/// Execute `airdrop ledger`.
pub fn run_ledger(args: &LedgerArgs, settings: &ConfigArgs) -> Result<u8> {
    let store = FileLedgerStore::new(&settings.ledger);
    match &args.command {
        LedgerCommand::Show { json } => show(&store, *json),
        LedgerCommand::Verify => verify(&store),
        LedgerCommand::Export { out } => export(&store, out),
        LedgerCommand::Resolve(resolve_args) => resolve(&store, resolve_args),
    }
}

fn show(store: &FileLedgerStore, json: bool) -> Result<u8> {
    let loaded = store
        .load()
        .with_context(|| format!("failed to read ledger at {}", store.location()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(loaded.ledger.entries())?);
        return Ok(EXIT_OK);
    }
    for entry in loaded.ledger.entries() {
        if entry.proofs.is_empty() {
            println!("{}", entry.address);
        } else {
            let proofs: Vec<&str> = entry.proofs.iter().map(|p| p.as_str()).collect();
            println!("{} {}", entry.address, proofs.join(" "));
        }
    }
    Ok(EXIT_OK)
}

/// Returns [`EXIT_FAILURE`] when anything needs attention.
pub fn verify(store: &FileLedgerStore) -> Result<u8> {
    let loaded = store
        .load()
        .with_context(|| format!("failed to read ledger at {}", store.location()))?;
    let report = &loaded.report;
    let mut problems = 0usize;

    if !report.existed {
        println!("{}: no ledger yet (first run)", store.location());
    } else {
        println!(
            "{}: {} entr{}, {} distinct address(es), format {}",
            store.location(),
            loaded.ledger.len(),
            if loaded.ledger.len() == 1 { "y" } else { "ies" },
            loaded.ledger.distinct_addresses(),
            report
                .version
                .map(|v| format!("v{v}"))
                .unwrap_or_else(|| "legacy".to_string())
        );
    }
    if report.legacy_lines > 0 {
        println!(
            "note: {} legacy line(s); `airdrop ledger export` rewrites them",
            report.legacy_lines
        );
    }
    if !report.corrupt_lines.is_empty() {
        problems += 1;
        println!("corrupt lines (no address found): {:?}", report.corrupt_lines);
    }
    if report.lossy_utf8 {
        problems += 1;
        println!("file contains bytes that are not valid UTF-8");
    }

    let duplicates = loaded.ledger.duplicate_addresses();
    if !duplicates.is_empty() {
        problems += 1;
        println!("{} address(es) recorded more than once:", duplicates.len());
        for d in duplicates {
            println!("  {d}");
        }
    }

    let journal = store.journal();
    let pending = journal.pending().context("failed to read in-flight journal")?;
    if !pending.is_empty() {
        problems += 1;
        println!(
            "{} in-flight batch(es) in {}; settle with `airdrop ledger resolve`",
            pending.len(),
            journal.location()
        );
    }

    if problems == 0 {
        println!("ok");
        Ok(EXIT_OK)
    } else {
        Ok(EXIT_FAILURE)
    }
}

pub fn export(store: &FileLedgerStore, out: &Path) -> Result<u8> {
    if out == store.path() {
        bail!("refusing to export over the live ledger {}", out.display());
    }
    let loaded = store
        .load()
        .with_context(|| format!("failed to read ledger at {}", store.location()))?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(out)
        .with_context(|| format!("refusing to overwrite or unable to create {}", out.display()))?;
    file.write_all(render_v1(&loaded.ledger).as_bytes())
        .with_context(|| format!("failed to write {}", out.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", out.display()))?;

    println!(
        "exported {} entr{} to {}",
        loaded.ledger.len(),
        if loaded.ledger.len() == 1 { "y" } else { "ies" },
        out.display()
    );
    Ok(EXIT_OK)
}

/// Settle every pending in-flight batch, then clear the journal.
///
/// `--paid` needs at least one proof per batch, either confirmed in the
/// journal or given with `--proof`. Recipients already in the ledger are not
/// appended twice. `--unpaid` also discards a journal that no longer parses.
pub fn resolve(store: &FileLedgerStore, args: &ResolveArgs) -> Result<u8> {
    let journal = store.journal();
    let pending = match journal.pending() {
        Ok(pending) => pending,
        Err(e @ LedgerError::Journal { .. }) if args.unpaid => {
            tracing::warn!(error = %e, "discarding unreadable in-flight journal as unpaid");
            journal.clear().context("failed to clear in-flight journal")?;
            println!("discarded unreadable in-flight journal {}", journal.location());
            return Ok(EXIT_OK);
        }
        Err(e @ LedgerError::Journal { .. }) => {
            return Err(e).context(
                "failed to read in-flight journal; `airdrop ledger resolve --unpaid` discards it",
            )
        }
        Err(e) => return Err(e).context("failed to read in-flight journal"),
    };
    if pending.is_empty() {
        // A torn final line can be all that is left.
        journal.clear().context("failed to clear in-flight journal")?;
        println!("no in-flight batches in {}", journal.location());
        return Ok(EXIT_OK);
    }

    if args.paid {
        let extra = args
            .proofs
            .iter()
            .map(|p| ProofRef::new(p.clone()))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --proof")?;

        let loaded = store
            .load()
            .with_context(|| format!("failed to read ledger at {}", store.location()))?;
        let mut recorded: HashSet<Address> = loaded.ledger.address_set().into_iter().cloned().collect();

        let mut entries = Vec::new();
        for batch in &pending {
            let batch_entries = resolve_paid(batch, &extra);
            if batch_entries.iter().any(|e| e.proofs.is_empty()) {
                bail!(
                    "batch {} of run {} has no confirmed proof; pass --proof <tx hash>",
                    batch.batch + 1,
                    batch.run_id
                );
            }
            for entry in batch_entries {
                if recorded.insert(entry.address.clone()) {
                    entries.push(entry);
                }
            }
        }

        store
            .append(&entries)
            .with_context(|| format!("failed to append to ledger at {}", store.location()))?;
        tracing::info!(batches = pending.len(), entries = entries.len(), "resolved in-flight batches as paid");
        println!(
            "recorded {} recipient(s) from {} batch(es) as paid",
            entries.len(),
            pending.len()
        );
    } else {
        tracing::warn!(batches = pending.len(), "discarding in-flight batches as unpaid");
        println!(
            "discarded {} in-flight batch(es); their recipients will be paid by the next run",
            pending.len()
        );
    }

    journal.clear().context("failed to clear in-flight journal")?;
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_core::{LedgerEntry, TransferLeg};
    use airdrop_ledger::{JournalRecord, LEDGER_HEADER};
    use chrono::Utc;
    use uuid::Uuid;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn proof(n: u8) -> ProofRef {
        ProofRef::new(format!("0x{:064x}", n)).unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> FileLedgerStore {
        FileLedgerStore::new(dir.path().join("DISTRIBUTIONS.csv"))
    }

    fn submit(store: &FileLedgerStore, run_id: Uuid, recipients: Vec<Address>) {
        store
            .journal()
            .record(&JournalRecord::Submitted {
                run_id,
                batch: 1,
                leg: TransferLeg::Token,
                recipients,
                idempotency_key: "k".into(),
                at: Utc::now(),
            })
            .unwrap();
    }

    fn confirm(store: &FileLedgerStore, run_id: Uuid, p: ProofRef) {
        store
            .journal()
            .record(&JournalRecord::Confirmed {
                run_id,
                batch: 1,
                leg: TransferLeg::Token,
                proof: p,
                at: Utc::now(),
            })
            .unwrap();
    }

    fn paid() -> ResolveArgs {
        ResolveArgs {
            paid: true,
            ..Default::default()
        }
    }

    #[test]
    fn resolve_paid_records_confirmed_batch_and_clears_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let run_id = Uuid::new_v4();
        submit(&store, run_id, vec![addr(1), addr(2)]);
        confirm(&store, run_id, proof(9));

        assert_eq!(resolve(&store, &paid()).unwrap(), EXIT_OK);

        let entries = store.load().unwrap().ledger.entries().to_vec();
        assert_eq!(
            entries,
            vec![
                LedgerEntry::with_proofs(addr(1), vec![proof(9)]),
                LedgerEntry::with_proofs(addr(2), vec![proof(9)]),
            ]
        );
        assert!(store.journal().is_empty().unwrap());
    }

    #[test]
    fn resolve_paid_without_any_proof_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        submit(&store, Uuid::new_v4(), vec![addr(1)]);

        assert!(resolve(&store, &paid()).is_err());
        assert!(store.load().unwrap().ledger.is_empty());
        assert!(!store.journal().is_empty().unwrap());
    }

    #[test]
    fn resolve_paid_accepts_operator_proof() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        submit(&store, Uuid::new_v4(), vec![addr(1)]);

        let args = ResolveArgs {
            paid: true,
            proofs: vec![proof(7).as_str().to_string()],
            ..Default::default()
        };
        assert_eq!(resolve(&store, &args).unwrap(), EXIT_OK);
        let entries = store.load().unwrap().ledger.entries().to_vec();
        assert_eq!(entries, vec![LedgerEntry::with_proofs(addr(1), vec![proof(7)])]);
    }

    #[test]
    fn resolve_paid_skips_recipients_already_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&[LedgerEntry::bare(addr(1))]).unwrap();
        let run_id = Uuid::new_v4();
        submit(&store, run_id, vec![addr(1), addr(2)]);
        confirm(&store, run_id, proof(3));

        resolve(&store, &paid()).unwrap();
        let ledger = store.load().unwrap().ledger;
        assert_eq!(ledger.len(), 2);
        assert!(ledger.duplicate_addresses().is_empty());
    }

    #[test]
    fn resolve_unpaid_only_clears_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        submit(&store, Uuid::new_v4(), vec![addr(1)]);

        let args = ResolveArgs {
            unpaid: true,
            ..Default::default()
        };
        assert_eq!(resolve(&store, &args).unwrap(), EXIT_OK);
        assert!(store.load().unwrap().ledger.is_empty());
        assert!(store.journal().is_empty().unwrap());
    }

    #[test]
    fn resolve_unpaid_clears_a_torn_journal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let path = dir.path().join("DISTRIBUTIONS.csv.inflight");
        std::fs::write(&path, r#"{"state":"submitted","run_id":"6f"#).unwrap();

        let args = ResolveArgs {
            unpaid: true,
            ..Default::default()
        };
        assert_eq!(resolve(&store, &args).unwrap(), EXIT_OK);
        assert!(!path.exists());
        assert!(!store.path().exists());
    }

    #[test]
    fn resolve_unpaid_discards_a_corrupt_journal_but_paid_refuses() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let path = dir.path().join("DISTRIBUTIONS.csv.inflight");
        std::fs::write(&path, "{not json}\n").unwrap();
        submit(&store, Uuid::new_v4(), vec![addr(1)]);

        let err = resolve(&store, &paid()).unwrap_err();
        assert!(format!("{err:#}").contains("--unpaid"));
        assert!(store.load().unwrap().ledger.is_empty());
        assert!(path.exists());

        let args = ResolveArgs {
            unpaid: true,
            ..Default::default()
        };
        assert_eq!(resolve(&store, &args).unwrap(), EXIT_OK);
        assert!(!path.exists());
    }

    #[test]
    fn export_writes_v1_to_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "0x00000000000000000000000000000000000000a1\n").unwrap();

        let out = dir.path().join("export.csv");
        assert_eq!(export(&store, &out).unwrap(), EXIT_OK);
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with(LEDGER_HEADER));
        assert!(text.contains("0x00000000000000000000000000000000000000a1"));
    }

    #[test]
    fn export_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&[LedgerEntry::bare(addr(1))]).unwrap();

        let out = dir.path().join("existing.csv");
        std::fs::write(&out, "keep me").unwrap();
        assert!(export(&store, &out).is_err());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "keep me");

        assert!(export(&store, store.path()).is_err());
    }

    #[test]
    fn verify_flags_duplicates_and_pending_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&[LedgerEntry::bare(addr(1))]).unwrap();
        assert_eq!(verify(&store).unwrap(), EXIT_OK);

        store.append(&[LedgerEntry::bare(addr(1))]).unwrap();
        assert_eq!(verify(&store).unwrap(), EXIT_FAILURE);

        let clean = tempfile::tempdir().unwrap();
        let clean_store = store_in(&clean);
        submit(&clean_store, Uuid::new_v4(), vec![addr(2)]);
        assert_eq!(verify(&clean_store).unwrap(), EXIT_FAILURE);
    }

    #[test]
    fn verify_of_missing_ledger_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(verify(&store_in(&dir)).unwrap(), EXIT_OK);
    }
}
