//! # Distribution Configuration
//!
//! Everything a run needs that is not computed: who is eligible (community
//! and role), what each recipient receives, how large a batch may be, and
//! where the collaborators live. Passed to the orchestrator at construction
//! and validated there.
//!
//! Deserializes from YAML/JSON with defaults matching the original
//! deployment; only the amounts and the three on-chain addresses have no
//! default.

use std::num::NonZeroUsize;

use airdrop_core::{Address, TokenAmount, ValidationError, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use url::Url;

/// Community whose role members are eligible.
pub const DEFAULT_COMMUNITY: &str = "increment";

/// Role within [`DEFAULT_COMMUNITY`] that qualifies for the airdrop.
pub const DEFAULT_ROLE_ID: u64 = 9494;

/// What to do when a previous run left an unresolved in-flight batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Refuse to run until the operator resolves the batch.
    #[default]
    Halt,
    /// Discard the markers and let the diff resubmit the batch.
    Resubmit,
}

impl std::fmt::Display for InFlightPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halt => write!(f, "halt"),
            Self::Resubmit => write!(f, "resubmit"),
        }
    }
}

impl std::str::FromStr for InFlightPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "resubmit" => Ok(Self::Resubmit),
            other => Err(ConfigError::InvalidField {
                field: "in_flight_policy",
                reason: format!("expected `halt` or `resubmit`, got `{other}`"),
            }),
        }
    }
}

/// Configuration for one distribution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionConfig {
    #[serde(default = "default_community")]
    pub community_id: String,
    #[serde(default = "default_role_id")]
    pub role_id: u64,
    /// Token base units each new recipient receives.
    pub token_amount: TokenAmount,
    /// Native-currency base units each new recipient receives, if any.
    #[serde(default)]
    pub native_amount: Option<TokenAmount>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_disperse_endpoint")]
    pub disperse_endpoint: Url,
    #[serde(default = "default_membership_endpoint")]
    pub membership_endpoint: Url,
    /// ERC-20 token being distributed.
    pub token_address: Address,
    /// Disperse (multi-send) contract the transfers go through.
    pub disperse_contract: Address,
    /// Account the relay sends from; owner of the allowance.
    pub sender: Address,
    #[serde(default)]
    pub in_flight_policy: InFlightPolicy,
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_role_id() -> u64 {
    DEFAULT_ROLE_ID
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_disperse_endpoint() -> Url {
    parse_default_url(airdrop_client::config::DEFAULT_DISPERSE_URL)
}

fn default_membership_endpoint() -> Url {
    parse_default_url(airdrop_client::config::DEFAULT_MEMBERSHIP_URL)
}

fn parse_default_url(raw: &str) -> Url {
    match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => unreachable!("built-in default URL {raw} must parse: {e}"),
    }
}

impl DistributionConfig {
    /// Configuration with defaults for everything but amounts and addresses.
    pub fn new(
        token_amount: TokenAmount,
        token_address: Address,
        disperse_contract: Address,
        sender: Address,
    ) -> Self {
        Self {
            community_id: default_community(),
            role_id: DEFAULT_ROLE_ID,
            token_amount,
            native_amount: None,
            batch_size: DEFAULT_BATCH_SIZE,
            disperse_endpoint: default_disperse_endpoint(),
            membership_endpoint: default_membership_endpoint(),
            token_address,
            disperse_contract,
            sender,
            in_flight_policy: InFlightPolicy::default(),
        }
    }

    /// Check field ranges. Called by the orchestrator before any I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.community_id.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "community_id",
                reason: "must not be empty".into(),
            });
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidBatchSize {
                size: self.batch_size,
                max: MAX_BATCH_SIZE,
            }
            .into());
        }
        if self.token_amount.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "token_amount",
                reason: "must be greater than zero".into(),
            });
        }
        if self.native_amount.is_some_and(|a| a.is_zero()) {
            return Err(ConfigError::InvalidField {
                field: "native_amount",
                reason: "must be greater than zero when set; omit it to skip the native leg".into(),
            });
        }
        Ok(())
    }

    /// Batch size as the batcher wants it.
    pub fn max_batch_size(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size).ok_or_else(|| {
            ValidationError::InvalidBatchSize {
                size: self.batch_size,
                max: MAX_BATCH_SIZE,
            }
            .into()
        })
    }

    /// Per-recipient native amount, when the native leg is enabled.
    pub fn native_leg(&self) -> Option<TokenAmount> {
        self.native_amount.filter(|a| !a.is_zero())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
