//! # Disperse Adapter Interface
//!
//! A batch is paid by one multi-send call against a disperse contract: the
//! token leg moves `values[i]` of an ERC-20 token to `recipients[i]`, the
//! optional native leg does the same with the chain's native currency.
//! Before the token leg can run, the disperse contract needs an allowance on
//! the sender's tokens.
//!
//! The [`DisperseAdapter`] trait abstracts over whoever signs and broadcasts
//! those calls. Production uses [`HttpDisperseAdapter`](crate::HttpDisperseAdapter)
//! against a signing relay; tests use [`MockDisperseAdapter`].
//!
//! ## Confirmation
//!
//! Every submitting method resolves only once the transaction is confirmed,
//! and returns its [`ProofRef`] (transaction hash). A reverted or unconfirmed
//! transaction is an error, never an `Ok`.
//!
//! ## Failure classes
//!
//! [`DisperseError::is_definite`] separates failures where nothing was paid
//! (rejected or never delivered, reverted on-chain) from ambiguous ones where
//! the transfer may have landed (transport errors, timeouts, missing
//! confirmation). Callers must not resubmit an ambiguous failure blindly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use airdrop_core::{Address, ProofRef, TokenAmount};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from disperse operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisperseError {
    /// The relay refused the request before broadcasting anything.
    #[error("{operation} rejected by relay: {reason}")]
    Rejected { operation: String, reason: String },

    /// The transaction was mined but reverted. Nothing was transferred.
    #[error("{operation} reverted on-chain in {proof}")]
    Reverted { operation: String, proof: ProofRef },

    /// The transaction was broadcast but its confirmation was not observed.
    #[error("{operation} not confirmed{}: {reason}", .proof.as_ref().map(|p| format!(" ({p})")).unwrap_or_default())]
    Unconfirmed {
        operation: String,
        proof: Option<ProofRef>,
        reason: String,
    },

    /// The relay could not be reached at all, so nothing was submitted.
    #[error("disperse relay unreachable during {operation}: {reason}")]
    Unreachable { operation: String, reason: String },

    /// The relay failed mid-request or returned a 5xx status.
    #[error("disperse relay unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },

    /// The request timed out before a response arrived.
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// The relay answered with something that could not be interpreted.
    #[error("invalid relay response to {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    /// The adapter cannot be used in this deployment.
    #[error("disperse adapter not configured: {reason}")]
    NotConfigured { reason: String },
}

impl DisperseError {
    /// Whether the failure guarantees that no value moved.
    pub fn is_definite(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. }
                | Self::Reverted { .. }
                | Self::Unreachable { .. }
                | Self::NotConfigured { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Allowance grant for the disperse contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub token: Address,
    pub spender: Address,
    pub amount: TokenAmount,
    pub idempotency_key: String,
}

/// Token leg of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDisperseRequest {
    pub contract: Address,
    pub token: Address,
    pub recipients: Vec<Address>,
    /// Parallel to `recipients`.
    pub values: Vec<TokenAmount>,
    pub idempotency_key: String,
}

/// Native-currency leg of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeDisperseRequest {
    pub contract: Address,
    pub recipients: Vec<Address>,
    pub values: Vec<TokenAmount>,
    /// Value attached to the call; must equal the sum of `values`.
    pub total_value: TokenAmount,
    pub idempotency_key: String,
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub proof: ProofRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Signs, broadcasts, and confirms disperse transactions.
///
/// Implementations must be `Send + Sync` and return `Send` futures so the
/// orchestrator can run inside a multi-threaded runtime.
pub trait DisperseAdapter: Send + Sync {
    /// Current allowance `owner` has granted `spender` on `token`.
    fn token_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
    ) -> impl Future<Output = Result<TokenAmount, DisperseError>> + Send;

    /// Grant the disperse contract an allowance and wait for confirmation.
    fn approve(
        &self,
        request: &ApproveRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send;

    /// Submit the token leg and wait for confirmation.
    fn disperse_token(
        &self,
        request: &TokenDisperseRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send;

    /// Submit the native leg and wait for confirmation.
    fn disperse_native(
        &self,
        request: &NativeDisperseRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send;

    /// Name of this adapter implementation, for logging.
    fn adapter_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Mock adapter
// ---------------------------------------------------------------------------

/// A call observed by [`MockDisperseAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Allowance,
    Approve {
        amount: TokenAmount,
    },
    Token {
        recipients: Vec<Address>,
        values: Vec<TokenAmount>,
        idempotency_key: String,
    },
    Native {
        recipients: Vec<Address>,
        total_value: TokenAmount,
    },
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    allowance: TokenAmount,
    allowance_error: Option<DisperseError>,
    approve_error: Option<DisperseError>,
    /// Scripted failures keyed by 1-based disperse call number (both legs).
    disperse_failures: HashMap<usize, DisperseError>,
    disperse_calls: usize,
    tx_counter: u64,
}

impl MockState {
    fn confirm(&mut self, operation: &str) -> Result<Confirmation, DisperseError> {
        self.tx_counter += 1;
        let proof = ProofRef::new(format!("0x{:064x}", self.tx_counter)).map_err(|e| {
            DisperseError::InvalidResponse {
                operation: operation.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Confirmation {
            proof,
            block_number: Some(self.tx_counter),
        })
    }
}

/// In-process adapter for tests and `--mock-disperse` runs.
///
/// Every call confirms immediately with a synthetic transaction hash unless a
/// failure has been scripted. Clones share state, so a test can keep a handle
/// and inspect the calls an orchestrator made through another.
#[derive(Debug, Clone, Default)]
pub struct MockDisperseAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockDisperseAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing allowance.
    pub fn with_allowance(self, allowance: TokenAmount) -> Self {
        self.state.lock().allowance = allowance;
        self
    }

    /// Fail the `n`-th disperse call (1-based, token and native legs counted
    /// together) with `error`.
    pub fn fail_disperse_call(self, n: usize, error: DisperseError) -> Self {
        self.state.lock().disperse_failures.insert(n, error);
        self
    }

    /// Fail every approval with `error`.
    pub fn fail_approve(self, error: DisperseError) -> Self {
        self.state.lock().approve_error = Some(error);
        self
    }

    /// Fail every allowance query with `error`.
    pub fn fail_allowance(self, error: DisperseError) -> Self {
        self.state.lock().allowance_error = Some(error);
        self
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Recipient lists of successful or attempted token legs, in order.
    pub fn token_batches(&self) -> Vec<Vec<Address>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Token { recipients, .. } => Some(recipients.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn allowance(&self) -> TokenAmount {
        self.state.lock().allowance
    }

    fn disperse(&self, operation: &str, call: MockCall) -> Result<Confirmation, DisperseError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state.disperse_calls += 1;
        let n = state.disperse_calls;
        if let Some(err) = state.disperse_failures.remove(&n) {
            return Err(err);
        }
        state.confirm(operation)
    }
}

// The mock never yields, so each call completes synchronously and hands back
// a ready future. No lock is held across an await point.
impl DisperseAdapter for MockDisperseAdapter {
    fn token_allowance(
        &self,
        _token: &Address,
        _owner: &Address,
        _spender: &Address,
    ) -> impl Future<Output = Result<TokenAmount, DisperseError>> + Send {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Allowance);
        let result = match &state.allowance_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.allowance),
        };
        std::future::ready(result)
    }

    fn approve(
        &self,
        request: &ApproveRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Approve {
            amount: request.amount,
        });
        let result = match state.approve_error.clone() {
            Some(err) => Err(err),
            None => {
                state.allowance = request.amount;
                state.confirm("approve")
            }
        };
        std::future::ready(result)
    }

    fn disperse_token(
        &self,
        request: &TokenDisperseRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send {
        std::future::ready(self.disperse(
            "disperse_token",
            MockCall::Token {
                recipients: request.recipients.clone(),
                values: request.values.clone(),
                idempotency_key: request.idempotency_key.clone(),
            },
        ))
    }

    fn disperse_native(
        &self,
        request: &NativeDisperseRequest,
    ) -> impl Future<Output = Result<Confirmation, DisperseError>> + Send {
        std::future::ready(self.disperse(
            "disperse_native",
            MockCall::Native {
                recipients: request.recipients.clone(),
                total_value: request.total_value,
            },
        ))
    }

    fn adapter_name(&self) -> &str {
        "mock"
    }
}
