//! Run plans and reports, serializable for `--json` output.

use std::num::NonZeroUsize;

use airdrop_core::{batches, Address, Batches, DistributionResult, ProofRef, TokenAmount};
use airdrop_ledger::LoadReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::phase::RunPhase;

/// What the allowance step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllowanceOutcome {
    /// Nothing to distribute, so no allowance was checked.
    NotNeeded,
    /// The existing allowance already covered the run.
    Sufficient {
        current: TokenAmount,
        required: TokenAmount,
    },
    /// An approval was submitted and confirmed.
    Approved {
        previous: Option<TokenAmount>,
        required: TokenAmount,
        proof: ProofRef,
    },
    /// Checking or raising the allowance failed; the run went on regardless.
    Failed {
        required: TokenAmount,
        reason: String,
    },
}

/// Result of the read-only phases: who would be paid, in which batches.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub snapshot_size: usize,
    pub ledger_size: usize,
    pub ledger_report: LoadReport,
    pub new_addresses: Vec<Address>,
    pub batch_size: NonZeroUsize,
    /// Token total across all new addresses.
    pub token_total: TokenAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_total: Option<TokenAmount>,
}

impl RunPlan {
    pub fn is_empty(&self) -> bool {
        self.new_addresses.is_empty()
    }

    pub fn batch_count(&self) -> usize {
        airdrop_core::batch_count(self.new_addresses.len(), self.batch_size)
    }

    /// The batches this plan would submit, produced lazily.
    pub fn batches(&self) -> Batches<std::iter::Cloned<std::slice::Iter<'_, Address>>> {
        batches(self.new_addresses.iter().cloned(), self.batch_size)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub adapter: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot_size: usize,
    pub ledger_size: usize,
    pub new_addresses: usize,
    pub batches: Vec<DistributionResult>,
    pub allowance: AllowanceOutcome,
    pub phase: RunPhase,
}

impl RunReport {
    /// Addresses paid and recorded by this run.
    pub fn paid(&self) -> usize {
        self.batches.iter().map(|b| b.recipients.len()).sum()
    }
}
