//! `airdrop diff`: fetch the role snapshot, load the ledger, and print the
//! addresses a run would pay, in snapshot order, one per line.

use airdrop_client::{GuildClient, MembershipSource};
use airdrop_core::new_addresses;
use airdrop_ledger::{FileLedgerStore, LedgerStore};
use anyhow::{Context, Result};
use clap::Args;

use crate::settings::{load_settings, ConfigArgs, MembershipSettings};
use crate::{EXIT_CONFIG, EXIT_OK};

/// Arguments for `airdrop diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Print a JSON array instead of one address per line.
    #[arg(long)]
    pub json: bool,
}

/// Execute `airdrop diff`.
pub async fn run_diff(args: &DiffArgs, settings: &ConfigArgs) -> Result<u8> {
    let membership: MembershipSettings =
        match load_settings(settings.config.as_deref(), |k| std::env::var(k).ok()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("{e:#}");
                return Ok(EXIT_CONFIG);
            }
        };

    let client = GuildClient::new(&membership.client_config())
        .context("failed to build membership client")?;
    let snapshot = client
        .role_members(&membership.community_id, membership.role_id)
        .await
        .context("membership fetch failed")?;

    let store = FileLedgerStore::new(&settings.ledger);
    let loaded = store
        .load()
        .with_context(|| format!("failed to read ledger at {}", store.location()))?;
    if loaded.report.is_degraded() {
        tracing::warn!(
            corrupt_lines = ?loaded.report.corrupt_lines,
            lossy_utf8 = loaded.report.lossy_utf8,
            "ledger read best-effort; run `airdrop ledger verify`"
        );
    }

    let fresh = new_addresses(&snapshot, &loaded.ledger);
    tracing::info!(
        snapshot = snapshot.len(),
        ledger = loaded.ledger.len(),
        new = fresh.len(),
        "computed diff"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&fresh)?);
    } else {
        for address in &fresh {
            println!("{address}");
        }
    }
    Ok(EXIT_OK)
}
