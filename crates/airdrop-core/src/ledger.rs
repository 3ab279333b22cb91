//! # Ledger Model
//!
//! The ledger is the single source of truth for "has this address already
//! received a distribution". It is an ordered, append-only sequence of
//! [`LedgerEntry`] values; order reflects distribution chronology and carries
//! no other meaning.
//!
//! Persistence lives in `airdrop-ledger`. This module only defines the
//! in-memory shape and the membership queries the diff engine needs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ValidationError;

/// Opaque locator of a confirmed transfer (typically a transaction hash).
///
/// Proof references are stored verbatim. They must be non-empty and free of
/// commas and whitespace so they can sit in a comma-delimited ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProofRef(String);

impl ProofRef {
    /// Validate and wrap a proof reference.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.is_empty() || s.chars().any(|c| c == ',' || c.is_whitespace()) {
            return Err(ValidationError::InvalidProofRef(s));
        }
        Ok(Self(s))
    }

    /// Access the proof reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProofRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProofRef {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProofRef> for String {
    fn from(p: ProofRef) -> Self {
        p.0
    }
}

/// One paid recipient and the proof references of the transfers that paid it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub address: Address,
    #[serde(default)]
    pub proofs: Vec<ProofRef>,
}

impl LedgerEntry {
    /// An entry with no proof references (legacy records).
    pub fn bare(address: Address) -> Self {
        Self {
            address,
            proofs: Vec::new(),
        }
    }

    /// An entry carrying the given proof references.
    pub fn with_proofs(address: Address, proofs: Vec<ProofRef>) -> Self {
        Self { address, proofs }
    }
}

/// The full ordered sequence of ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// An empty ledger (first run).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from entries in chronological order.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        Self { entries }
    }

    /// All entries in chronological order, duplicates included.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The set of canonical addresses already paid.
    pub fn address_set(&self) -> HashSet<&Address> {
        self.entries.iter().map(|e| &e.address).collect()
    }

    /// Number of distinct addresses in the ledger.
    pub fn distinct_addresses(&self) -> usize {
        self.address_set().len()
    }

    /// Addresses recorded more than once, in order of their second occurrence.
    pub fn duplicate_addresses(&self) -> Vec<&Address> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| !seen.insert(&e.address))
            .map(|e| &e.address)
            .collect()
    }

    /// Mirror an append that has already been persisted.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.entries.extend(entries);
    }
}
