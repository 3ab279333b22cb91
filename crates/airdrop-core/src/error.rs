//! # Validation Errors
//!
//! Errors raised when constructing airdrop-core primitives. Each variant
//! carries the rejected input so an operator can find the offending ledger
//! line, config value, or membership entry without guesswork.

use thiserror::Error;

/// Validation errors for the airdrop domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Address is not `0x` followed by exactly 40 hexadecimal digits.
    #[error("invalid address: \"{0}\" (expected 0x followed by 40 hex digits)")]
    InvalidAddress(String),

    /// Token amount is not a non-negative decimal integer in base units.
    #[error("invalid token amount: \"{0}\" (expected a decimal integer in base units)")]
    InvalidAmount(String),

    /// Proof reference is empty or contains a delimiter.
    #[error("invalid proof reference: \"{0}\" (must be non-empty, without commas or whitespace)")]
    InvalidProofRef(String),

    /// Batch size outside the accepted range.
    #[error("invalid batch size {size}: must be between 1 and {max}")]
    InvalidBatchSize {
        /// The rejected size.
        size: usize,
        /// The largest accepted size.
        max: usize,
    },

    /// Multiplying a per-address amount by a recipient count overflowed.
    #[error("amount overflow: {per_address} x {count} recipients exceeds u128")]
    AmountOverflow {
        /// Per-address amount in base units.
        per_address: u128,
        /// Number of recipients.
        count: usize,
    },
}
