//! # Diff Engine
//!
//! Computes which snapshot addresses have not yet been paid. The ledger's
//! addresses are loaded into a hash set once, so the cost is linear in the
//! snapshot size regardless of how large the ledger grows.

use std::collections::HashSet;

use crate::address::Address;
use crate::ledger::Ledger;

/// Snapshot addresses absent from the ledger, in snapshot order.
///
/// An address repeated within the snapshot is returned once (first
/// occurrence), so a single run can never pay the same recipient twice.
pub fn new_addresses(snapshot: &[Address], ledger: &Ledger) -> Vec<Address> {
    let paid = ledger.address_set();
    let mut seen: HashSet<&Address> = HashSet::with_capacity(snapshot.len());
    snapshot
        .iter()
        .filter(|a| !paid.contains(*a) && seen.insert(*a))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerEntry;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn ledger_of(addrs: &[Address]) -> Ledger {
        Ledger::from_entries(addrs.iter().cloned().map(LedgerEntry::bare).collect())
    }

    #[test]
    fn empty_ledger_returns_whole_snapshot() {
        let snapshot = vec![addr(1), addr(2), addr(3)];
        assert_eq!(new_addresses(&snapshot, &Ledger::new()), snapshot);
    }

    #[test]
    fn already_paid_addresses_are_excluded() {
        let snapshot = vec![addr(1), addr(2), addr(3)];
        let ledger = ledger_of(&[addr(1)]);
        assert_eq!(new_addresses(&snapshot, &ledger), vec![addr(2), addr(3)]);
    }

    #[test]
    fn fully_covered_snapshot_yields_nothing() {
        let snapshot = vec![addr(1), addr(2)];
        let ledger = ledger_of(&[addr(2), addr(1), addr(9)]);
        assert!(new_addresses(&snapshot, &ledger).is_empty());
    }

    #[test]
    fn case_variants_match_ledger() {
        let mixed = Address::parse("0xAB5801A7D398351B8BE11C439E05C5B3259AEC9B").unwrap();
        let lower = Address::parse("0xab5801a7d398351b8be11c439e05c5b3259aec9b").unwrap();
        let ledger = ledger_of(&[lower]);
        assert!(new_addresses(&[mixed], &ledger).is_empty());
    }

    #[test]
    fn snapshot_duplicates_collapse() {
        let snapshot = vec![addr(1), addr(2), addr(1)];
        assert_eq!(new_addresses(&snapshot, &Ledger::new()), vec![addr(1), addr(2)]);
    }
}
