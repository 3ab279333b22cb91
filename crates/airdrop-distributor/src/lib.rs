//! # airdrop-distributor — Distribution Orchestrator
//!
//! Sequences one airdrop run over the collaborators defined elsewhere in the
//! workspace:
//!
//! ```text
//! MembershipSource ──► snapshot ─┐
//!                                ├─► new_addresses ─► batches ─► DisperseAdapter
//! LedgerStore ───────► ledger ───┘                                    │
//!      ▲                                                              │
//!      └──────────── append(batch) after confirmation ◄───────────────┘
//! ```
//!
//! - [`config`]: [`DistributionConfig`] and its validation.
//! - [`orchestrator`]: [`Distributor`], the run protocol.
//! - [`phase`]: the run state machine.
//! - [`report`]: [`RunPlan`] (dry run) and [`RunReport`].
//! - [`error`]: [`DistributionError`], including the unrecorded-payment class.
//!
//! Nothing here runs concurrently. Each await is one external call, and the
//! next batch starts only after the previous one is in the ledger.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod report;

pub use config::{ConfigError, DistributionConfig, InFlightPolicy, DEFAULT_COMMUNITY, DEFAULT_ROLE_ID};
pub use error::DistributionError;
pub use orchestrator::{resolve_paid, Distributor};
pub use phase::RunPhase;
pub use report::{AllowanceOutcome, RunPlan, RunReport};
