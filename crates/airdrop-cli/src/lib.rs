//! # airdrop-cli — the `airdrop` command
//!
//! ## Subcommands
//!
//! - `airdrop run` — distribute to every role member not yet in the ledger.
//!   `--dry-run` stops after the diff and prints the batch plan.
//! - `airdrop diff` — print the addresses that would be paid, one per line.
//! - `airdrop ledger show|verify|export|resolve` — inspect the ledger, check
//!   it for damage, rewrite it in the v1 format, or settle an in-flight batch
//!   left behind by an interrupted run.
//!
//! ```bash
//! airdrop --config airdrop.yaml run --dry-run
//! airdrop --config airdrop.yaml run
//! airdrop ledger resolve --paid --proof 0xabc…
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning                                                       |
//! |------|---------------------------------------------------------------|
//! | 0    | success                                                       |
//! | 1    | the run failed; the ledger reflects every confirmed batch     |
//! | 2    | invalid configuration or arguments                            |
//! | 3    | UNRECORDED PAYMENT: funds moved but the ledger write failed    |
//! | 4    | an earlier run left an in-flight batch that must be resolved  |

pub mod diff;
pub mod ledger;
pub mod run;
pub mod settings;

use airdrop_distributor::DistributionError;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_UNRECORDED_PAYMENT: u8 = 3;
pub const EXIT_IN_FLIGHT: u8 = 4;

/// Process exit code for a failed run.
pub fn exit_code_for(err: &DistributionError) -> u8 {
    match err {
        DistributionError::UnrecordedPayment { .. } => EXIT_UNRECORDED_PAYMENT,
        DistributionError::InFlightUnresolved { .. } => EXIT_IN_FLIGHT,
        DistributionError::Config(_) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdrop_core::{Address, ProofRef};
    use airdrop_ledger::LedgerError;

    #[test]
    fn unrecorded_payment_has_its_own_exit_code() {
        let err = DistributionError::UnrecordedPayment {
            batch: 0,
            proofs: vec![ProofRef::new("0xabc").unwrap()],
            recipients: vec![Address::parse("0x00000000000000000000000000000000000000a1").unwrap()],
            source: LedgerError::Io {
                operation: "append",
                path: "DISTRIBUTIONS.csv".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            },
        };
        assert_eq!(exit_code_for(&err), EXIT_UNRECORDED_PAYMENT);
    }

    #[test]
    fn in_flight_and_config_codes() {
        let in_flight = DistributionError::InFlightUnresolved {
            journal: "DISTRIBUTIONS.csv.inflight".into(),
            batches: Vec::new(),
        };
        assert_eq!(exit_code_for(&in_flight), EXIT_IN_FLIGHT);

        let config = DistributionError::Config(airdrop_distributor::ConfigError::InvalidField {
            field: "batch_size",
            reason: "must be at least 1".into(),
        });
        assert_eq!(exit_code_for(&config), EXIT_CONFIG);
    }
}
