//! File-level ledger behaviour across independent store handles, the way
//! separate runs of the binary see it.

use airdrop_core::{Address, LedgerEntry, ProofRef};
use airdrop_ledger::{parse_ledger_text, render_v1, FileLedgerStore, LedgerStore};

const TX_1: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
const TX_2: &str = "0x2f1c5c2b44f771e942a8506148e256f94f1a464babc938ae0690c6e34cd79190";

fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{:040x}", n)).unwrap()
}

#[test]
fn second_handle_sees_first_handles_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("DISTRIBUTIONS.csv");

    let writer = FileLedgerStore::new(&path);
    writer
        .append(&[LedgerEntry::with_proofs(
            addr(1),
            vec![ProofRef::new(TX_1).unwrap()],
        )])
        .unwrap();

    let reader = FileLedgerStore::new(&path);
    let loaded = reader.load().unwrap();
    assert_eq!(loaded.ledger.len(), 1);
    assert_eq!(loaded.ledger.entries()[0].proofs[0].as_str(), TX_1);
}

#[test]
fn records_with_and_without_native_proof_coexist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("DISTRIBUTIONS.csv");
    let store = FileLedgerStore::new(&path);

    store
        .append(&[LedgerEntry::with_proofs(
            addr(1),
            vec![ProofRef::new(TX_1).unwrap()],
        )])
        .unwrap();
    store
        .append(&[LedgerEntry::with_proofs(
            addr(2),
            vec![ProofRef::new(TX_1).unwrap(), ProofRef::new(TX_2).unwrap()],
        )])
        .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.ledger.entries()[0].proofs.len(), 1);
    assert_eq!(loaded.ledger.entries()[1].proofs.len(), 2);
    assert!(!loaded.report.is_degraded());
}

#[test]
fn legacy_ledger_exports_to_v1_without_losing_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("DISTRIBUTIONS.csv");
    std::fs::write(
        &path,
        "0x52908400098527886E0F7030069857D2E4169EE7,\n0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B",
    )
    .unwrap();

    let loaded = FileLedgerStore::new(&path).load().unwrap();
    let exported = render_v1(&loaded.ledger);
    let reparsed = parse_ledger_text(&exported);

    assert_eq!(reparsed.version, Some(1));
    assert_eq!(reparsed.entries, loaded.ledger.entries());
    assert_eq!(reparsed.legacy_lines, 0);
}
