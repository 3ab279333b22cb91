//! Run-level error taxonomy.
//!
//! Each variant says where the run stopped and what state it left behind:
//!
//! | Variant              | Ledger touched? | Funds moved?              |
//! |----------------------|-----------------|---------------------------|
//! | `Config`             | no              | no                        |
//! | `InFlightUnresolved` | no              | maybe, by an earlier run  |
//! | `Membership`         | no              | no                        |
//! | `LedgerRead`         | no              | no                        |
//! | `Amount`             | no              | no                        |
//! | `Journal`            | earlier batches | earlier batches only      |
//! | `Transfer`           | earlier batches | earlier batches, see `confirmed` |
//! | `UnrecordedPayment`  | earlier batches | **yes, this batch too**   |

use airdrop_client::{DisperseError, MembershipError};
use airdrop_core::{Address, ProofRef, TransferLeg, ValidationError};
use airdrop_ledger::{InFlightBatch, LedgerError};

use crate::config::ConfigError;

/// Errors that end a distribution run.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A previous run may have paid a batch it never recorded.
    #[error(
        "{} unresolved in-flight batch(es) in {journal}; resolve with `airdrop ledger resolve` before running again",
        .batches.len()
    )]
    InFlightUnresolved {
        journal: String,
        batches: Vec<InFlightBatch>,
    },

    #[error("membership fetch failed: {0}")]
    Membership(#[from] MembershipError),

    #[error("failed to read ledger at {location}: {source}")]
    LedgerRead {
        location: String,
        source: LedgerError,
    },

    #[error("in-flight journal error: {0}")]
    Journal(LedgerError),

    #[error("amount error: {0}")]
    Amount(#[from] ValidationError),

    /// A transfer was rejected, reverted, or not confirmed.
    #[error(
        "batch {} {leg} transfer to {} recipient(s) failed: {source}",
        .batch + 1,
        .recipients.len()
    )]
    Transfer {
        batch: usize,
        leg: TransferLeg,
        recipients: Vec<Address>,
        /// Legs of this batch that had already confirmed.
        confirmed: Vec<ProofRef>,
        source: DisperseError,
    },

    /// Transfers confirmed on-chain but the ledger append failed.
    #[error(
        "UNRECORDED PAYMENT: batch {} paid {} recipient(s) in [{}] but the ledger write failed: {source}",
        .batch + 1,
        .recipients.len(),
        .proofs.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
    )]
    UnrecordedPayment {
        batch: usize,
        proofs: Vec<ProofRef>,
        recipients: Vec<Address>,
        source: LedgerError,
    },
}

impl DistributionError {
    /// Funds moved without a ledger record; needs manual reconciliation.
    pub fn is_unrecorded_payment(&self) -> bool {
        matches!(self, Self::UnrecordedPayment { .. })
    }

    /// Whether the run stopped before any transfer of its own was attempted.
    pub fn is_pre_transfer(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InFlightUnresolved { .. }
                | Self::Membership(_)
                | Self::LedgerRead { .. }
                | Self::Amount(_)
        )
    }
}
