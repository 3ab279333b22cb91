//! # airdrop-client — External Collaborators
//!
//! Typed clients for the two services a distribution run talks to:
//!
//! - [`membership`]: the Guild API, source of the eligible member set.
//! - [`disperse`] / [`http_disperse`]: the relay that signs, broadcasts, and
//!   confirms multi-send transfers and allowance grants.
//!
//! Each service sits behind a trait ([`MembershipSource`], [`DisperseAdapter`])
//! so the orchestrator can be driven by in-process fakes in tests and
//! `--mock-disperse` runs.
//!
//! ## Crate Policy
//!
//! - Depends on `airdrop-core` for the address and amount types only.
//! - No ledger access. Deciding who to pay and recording payments belongs to
//!   `airdrop-distributor`.
//! - Credentials are held in [`zeroize::Zeroizing`] and redacted from `Debug`.

pub mod config;
pub mod disperse;
pub mod error;
pub mod http_disperse;
pub mod membership;
pub(crate) mod retry;

pub use config::{ClientConfig, ConfigError};
pub use disperse::{
    ApproveRequest, Confirmation, DisperseAdapter, DisperseError, MockCall, MockDisperseAdapter,
    NativeDisperseRequest, TokenDisperseRequest,
};
pub use error::MembershipError;
pub use http_disperse::{HttpDisperseAdapter, TxResponse, TxStatus, IDEMPOTENCY_HEADER};
pub use membership::{GuildClient, GuildResponse, GuildRole, MembershipSource, StaticMembership};
