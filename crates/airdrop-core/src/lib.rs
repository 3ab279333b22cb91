//! # airdrop-core — Foundational Types for the Guild Airdrop
//!
//! Defines the domain primitives and the pure parts of a distribution run:
//!
//! - [`Address`]: canonical (lowercase) recipient identifier, validated at
//!   construction, plus [`extract_addresses`] for free-form ledger text.
//! - [`TokenAmount`]: base-unit amounts, never floating point.
//! - [`Ledger`], [`LedgerEntry`], [`ProofRef`]: the in-memory ledger model.
//! - [`new_addresses`]: the diff engine (snapshot minus ledger, order kept).
//! - [`batches`]: the lazy batcher, and [`DistributionResult`] per batch.
//!
//! ## Crate Policy
//!
//! - Leaf of the workspace DAG: no dependencies on other `airdrop-*` crates.
//! - No I/O. Persistence lives in `airdrop-ledger`, network access in
//!   `airdrop-client`.
//! - No `.unwrap()` outside tests.

pub mod address;
pub mod amount;
pub mod batch;
pub mod diff;
pub mod error;
pub mod ledger;

pub use address::{extract_addresses, Address};
pub use amount::TokenAmount;
pub use batch::{
    approval_idempotency_key, batch_count, batches, Batch, Batches, DistributionResult,
    TransferLeg, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE,
};
pub use diff::new_addresses;
pub use error::ValidationError;
pub use ledger::{Ledger, LedgerEntry, ProofRef};
