//! # Batcher
//!
//! Splits the new-address list into contiguous chunks small enough for one
//! multi-send contract call. [`batches`] is lazy: it pulls at most one
//! batch worth of addresses from its source at a time. Restartability does
//! not come from here; every run recomputes the diff from the ledger.
//!
//! Also defines the per-batch outcome ([`DistributionResult`]) and the
//! deterministic idempotency key attached to each transfer request.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::amount::TokenAmount;
use crate::ledger::{LedgerEntry, ProofRef};

/// Largest batch size accepted by configuration.
pub const MAX_BATCH_SIZE: usize = 500;

/// Default batch size, matching the disperse contract's practical call limit.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A non-empty, ordered group of recipients paid by one transfer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Zero-based position of this batch within its run.
    pub index: usize,
    pub recipients: Vec<Address>,
}

impl Batch {
    /// One-based batch number for operator-facing output.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Always false for batches produced by [`batches`].
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// Deterministic key identifying "pay these recipients this amount on this leg".
    ///
    /// The same batch resubmitted by a later run yields the same key, so a
    /// relay that honours idempotency keys can refuse the duplicate.
    pub fn idempotency_key(
        &self,
        leg: TransferLeg,
        asset: Option<&Address>,
        amount_each: TokenAmount,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(leg.as_str().as_bytes());
        hasher.update(b"|");
        if let Some(asset) = asset {
            hasher.update(asset.as_str().as_bytes());
        }
        hasher.update(b"|");
        hasher.update(amount_each.to_string().as_bytes());
        for r in &self.recipients {
            hasher.update(b"|");
            hasher.update(r.as_str().as_bytes());
        }
        hex_digest(hasher)
    }
}

/// Deterministic key for raising `spender`'s allowance on `token` from
/// `current` to `amount`.
pub fn approval_idempotency_key(
    token: &Address,
    spender: &Address,
    current: TokenAmount,
    amount: TokenAmount,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"approve|");
    hasher.update(token.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(spender.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(current.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(amount.to_string().as_bytes());
    hex_digest(hasher)
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Lazy iterator over batches; see [`batches`].
#[derive(Debug)]
pub struct Batches<I> {
    source: I,
    max_size: NonZeroUsize,
    next_index: usize,
}

impl<I: Iterator<Item = Address>> Iterator for Batches<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let recipients: Vec<Address> = self.source.by_ref().take(self.max_size.get()).collect();
        if recipients.is_empty() {
            return None;
        }
        let batch = Batch {
            index: self.next_index,
            recipients,
        };
        self.next_index += 1;
        Some(batch)
    }
}

/// Partition `addresses` into contiguous batches of at most `max_size`.
///
/// Order is preserved and only the last batch may be short. Empty input
/// yields no batches.
pub fn batches<I>(addresses: I, max_size: NonZeroUsize) -> Batches<I::IntoIter>
where
    I: IntoIterator<Item = Address>,
{
    Batches {
        source: addresses.into_iter(),
        max_size,
        next_index: 0,
    }
}

/// Number of batches `len` addresses split into.
pub fn batch_count(len: usize, max_size: NonZeroUsize) -> usize {
    len.div_ceil(max_size.get())
}

/// Which transfer a proof reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferLeg {
    /// ERC-20 style token transfer through the disperse contract.
    Token,
    /// Native currency transfer through the disperse contract.
    Native,
}

impl TransferLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Native => "native",
        }
    }
}

impl std::fmt::Display for TransferLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch whose transfers have all confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub batch: usize,
    pub recipients: Vec<Address>,
    pub token_proof: ProofRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_proof: Option<ProofRef>,
}

impl DistributionResult {
    /// Proof references in ledger order: token first, then native.
    pub fn proofs(&self) -> Vec<ProofRef> {
        std::iter::once(self.token_proof.clone())
            .chain(self.native_proof.clone())
            .collect()
    }

    /// One ledger entry per recipient, each carrying this batch's proofs.
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        let proofs = self.proofs();
        self.recipients
            .iter()
            .map(|a| LedgerEntry::with_proofs(a.clone(), proofs.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn five_addresses_in_pairs() {
        let addrs: Vec<_> = (1..=5).map(addr).collect();
        let out: Vec<Batch> = batches(addrs, size(2)).collect();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].recipients, vec![addr(1), addr(2)]);
        assert_eq!(out[1].recipients, vec![addr(3), addr(4)]);
        assert_eq!(out[2].recipients, vec![addr(5)]);
        assert_eq!(out[2].index, 2);
        assert_eq!(out[2].number(), 3);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert_eq!(batches(Vec::new(), size(10)).count(), 0);
        assert_eq!(batch_count(0, size(10)), 0);
    }

    #[test]
    fn batcher_pulls_lazily() {
        let mut pulled = 0usize;
        let source = (1..=10u8).map(|n| {
            pulled += 1;
            addr(n)
        });
        let mut it = batches(source, size(3));
        let first = it.next().unwrap();
        assert_eq!(first.len(), 3);
        drop(it);
        assert_eq!(pulled, 3);
    }

    #[test]
    fn idempotency_key_is_deterministic_and_leg_specific() {
        let b = Batch {
            index: 0,
            recipients: vec![addr(1), addr(2)],
        };
        let amount = TokenAmount::from_base_units(10);
        let token = addr(200);
        let k1 = b.idempotency_key(TransferLeg::Token, Some(&token), amount);
        let k2 = b.idempotency_key(TransferLeg::Token, Some(&token), amount);
        let k3 = b.idempotency_key(TransferLeg::Native, None, amount);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn idempotency_key_ignores_batch_index() {
        let a = Batch {
            index: 0,
            recipients: vec![addr(1)],
        };
        let b = Batch {
            index: 7,
            recipients: vec![addr(1)],
        };
        let amount = TokenAmount::from_base_units(1);
        assert_eq!(
            a.idempotency_key(TransferLeg::Native, None, amount),
            b.idempotency_key(TransferLeg::Native, None, amount)
        );
    }

    #[test]
    fn approval_key_changes_with_starting_allowance() {
        let token = addr(200);
        let spender = addr(201);
        let amount = TokenAmount::from_base_units(100);
        let fresh = approval_idempotency_key(&token, &spender, TokenAmount::ZERO, amount);
        let again = approval_idempotency_key(&token, &spender, TokenAmount::ZERO, amount);
        let topped = approval_idempotency_key(&token, &spender, TokenAmount::from_base_units(5), amount);
        assert_eq!(fresh, again);
        assert_ne!(fresh, topped);
    }

    #[test]
    fn ledger_entries_carry_both_proofs() {
        let result = DistributionResult {
            batch: 0,
            recipients: vec![addr(1), addr(2)],
            token_proof: ProofRef::new("0xaaa").unwrap(),
            native_proof: Some(ProofRef::new("0xbbb").unwrap()),
        };
        let entries = result.ledger_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].address, addr(2));
        assert_eq!(
            entries[1].proofs.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["0xaaa", "0xbbb"]
        );
    }
}
