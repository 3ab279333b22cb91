//! # Run Subcommand
//!
//! `airdrop run` executes a distribution against the configured relay.
//! `--dry-run` stops after the diff and prints the batch plan instead.
//! `--mock-disperse` swaps the relay for the in-process mock adapter, which
//! confirms every transfer without moving funds. A mock run diffs against a
//! copy of the ledger held in memory, so the ledger file and its in-flight
//! journal are never written.

use airdrop_client::{DisperseAdapter, GuildClient, HttpDisperseAdapter, MockDisperseAdapter};
use airdrop_distributor::{
    AllowanceOutcome, DistributionConfig, DistributionError, Distributor, RunPlan, RunReport,
};
use airdrop_ledger::{
    FileLedgerStore, InFlightBatch, InFlightJournal, LedgerStore, MemoryLedgerStore,
};
use anyhow::{Context, Result};
use clap::Args;

use crate::settings::{client_config, load_distribution_config, ConfigArgs};
use crate::{exit_code_for, EXIT_CONFIG, EXIT_OK};

/// Arguments for `airdrop run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after computing the diff and print the batch plan.
    #[arg(long)]
    pub dry_run: bool,

    /// Use the in-process mock disperse adapter instead of the relay.
    #[arg(long)]
    pub mock_disperse: bool,

    /// Print the plan or run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Execute `airdrop run`.
pub async fn run_distribution(args: &RunArgs, settings: &ConfigArgs) -> Result<u8> {
    let config = match load_distribution_config(settings.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return Ok(EXIT_CONFIG);
        }
    };

    let client = client_config(&config.membership_endpoint, &config.disperse_endpoint);
    let membership = GuildClient::new(&client).context("failed to build membership client")?;
    let store = FileLedgerStore::new(&settings.ledger);

    if args.mock_disperse {
        let (rehearsal, journal) = match mock_ledger(&store) {
            Ok(pair) => pair,
            Err(e) => return Ok(report_failure(&e)),
        };
        tracing::warn!(
            ledger = %store.location(),
            "using mock disperse adapter; no funds will move and the ledger file is not written"
        );
        drive(config, membership, MockDisperseAdapter::new(), rehearsal, journal, args).await
    } else {
        let journal = store.journal();
        let disperse = HttpDisperseAdapter::new(&client).context("failed to build relay client")?;
        drive(config, membership, disperse, store, journal, args).await
    }
}

/// In-memory copy of the file ledger plus a fresh journal for a mock run.
fn mock_ledger(
    store: &FileLedgerStore,
) -> Result<(MemoryLedgerStore, InFlightJournal), DistributionError> {
    let loaded = store.load().map_err(|source| DistributionError::LedgerRead {
        location: store.location(),
        source,
    })?;
    let pending = store.journal().pending().map_err(DistributionError::Journal)?;
    if !pending.is_empty() {
        tracing::warn!(
            journal = %store.journal().location(),
            batches = pending.len(),
            "in-flight batches pending; a real run will refuse to start"
        );
    }
    Ok((
        MemoryLedgerStore::with_entries(loaded.ledger.entries().to_vec()),
        InFlightJournal::in_memory(),
    ))
}

async fn drive<D: DisperseAdapter, L: LedgerStore>(
    config: DistributionConfig,
    membership: GuildClient,
    disperse: D,
    store: L,
    journal: InFlightJournal,
    args: &RunArgs,
) -> Result<u8> {
    let mut distributor = match Distributor::new(config, membership, disperse, store, journal) {
        Ok(d) => d,
        Err(e) => return Ok(report_failure(&e)),
    };

    if args.dry_run {
        let pending = distributor
            .journal()
            .pending()
            .context("failed to read in-flight journal")?;
        let plan = match distributor.plan().await {
            Ok(plan) => plan,
            Err(e) => return Ok(report_failure(&e)),
        };
        if args.json {
            let batches: Vec<_> = plan.batches().collect();
            let doc = serde_json::json!({
                "dry_run": true,
                "plan": &plan,
                "batches": batches,
                "in_flight_batches": pending.len(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        } else {
            print_plan(distributor.config(), &plan, &pending);
        }
        return Ok(EXIT_OK);
    }

    match distributor.run().await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(EXIT_OK)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

/// Log a failed run and pick the exit code.
fn report_failure(err: &DistributionError) -> u8 {
    tracing::error!("{err}");
    match err {
        DistributionError::UnrecordedPayment {
            batch,
            proofs,
            recipients,
            ..
        } => {
            eprintln!();
            eprintln!("!!! UNRECORDED PAYMENT !!!");
            eprintln!("Batch {} was paid on-chain but is NOT in the ledger.", batch + 1);
            eprintln!("Do not run again until these recipients are recorded.");
            for p in proofs {
                eprintln!("  proof      {p}");
            }
            for r in recipients {
                eprintln!("  recipient  {r}");
            }
            eprintln!("Record them with: airdrop ledger resolve --paid");
        }
        DistributionError::InFlightUnresolved { journal, batches } => {
            eprintln!("An earlier run left {} in-flight batch(es) in {journal}:", batches.len());
            print_in_flight(batches);
            eprintln!(
                "Check the relay for these transfers, then run `airdrop ledger resolve --paid` \
                 or `airdrop ledger resolve --unpaid`."
            );
        }
        DistributionError::Transfer { confirmed, .. } if !confirmed.is_empty() => {
            eprintln!(
                "Part of the failed batch confirmed ({}); it stays in the in-flight journal.",
                confirmed
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        _ => {}
    }
    exit_code_for(err)
}

fn print_in_flight(batches: &[InFlightBatch]) {
    for b in batches {
        let proofs = b.confirmed_proofs();
        eprintln!(
            "  run {} batch {}: {} recipient(s), confirmed [{}], unconfirmed {:?}",
            b.run_id,
            b.batch + 1,
            b.recipients.len(),
            proofs.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", "),
            b.unconfirmed_legs()
        );
    }
}

fn print_plan(config: &DistributionConfig, plan: &RunPlan, pending: &[InFlightBatch]) {
    println!(
        "community {} role {}: {} member(s), {} ledger entr{}, {} new",
        config.community_id,
        config.role_id,
        plan.snapshot_size,
        plan.ledger_size,
        if plan.ledger_size == 1 { "y" } else { "ies" },
        plan.new_addresses.len()
    );
    if plan.ledger_report.is_degraded() {
        println!(
            "warning: ledger was read best-effort (corrupt lines {:?}, lossy utf-8: {})",
            plan.ledger_report.corrupt_lines, plan.ledger_report.lossy_utf8
        );
    }
    if !pending.is_empty() {
        println!(
            "warning: {} in-flight batch(es) pending; a real run will refuse to start",
            pending.len()
        );
    }
    if plan.is_empty() {
        println!("nothing to distribute");
        return;
    }

    print!("token total {} ({} each)", plan.token_total, config.token_amount);
    match (plan.native_total, config.native_leg()) {
        (Some(total), Some(each)) => println!(", native total {total} ({each} each)"),
        _ => println!(),
    }

    let count = plan.batch_count();
    for batch in plan.batches() {
        println!("batch {}/{count} ({} recipient(s))", batch.number(), batch.len());
        for r in &batch.recipients {
            println!("  {r}");
        }
    }
}

fn print_report(report: &RunReport) {
    println!(
        "run {} via {}: paid {} of {} new address(es) in {} batch(es)",
        report.run_id,
        report.adapter,
        report.paid(),
        report.new_addresses,
        report.batches.len()
    );
    match &report.allowance {
        AllowanceOutcome::NotNeeded => {}
        AllowanceOutcome::Sufficient { current, required } => {
            println!("allowance {current} covers {required}");
        }
        AllowanceOutcome::Approved { required, proof, .. } => {
            println!("approved allowance {required} ({proof})");
        }
        AllowanceOutcome::Failed { required, reason } => {
            println!("warning: allowance step for {required} failed: {reason}");
        }
    }
    for b in &report.batches {
        match &b.native_proof {
            Some(native) => println!(
                "batch {}: {} recipient(s), token {}, native {native}",
                b.batch + 1,
                b.recipients.len(),
                b.token_proof
            ),
            None => println!(
                "batch {}: {} recipient(s), token {}",
                b.batch + 1,
                b.recipients.len(),
                b.token_proof
            ),
        }
    }
}
