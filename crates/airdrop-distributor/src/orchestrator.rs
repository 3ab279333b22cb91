//! # Distribution Orchestrator
//!
//! Drives one run: fetch the membership snapshot, load the ledger, diff,
//! make sure the disperse contract may spend the total, then pay the new
//! addresses batch by batch.
//!
//! ## Commit ordering
//!
//! Batches are strictly sequential. Batch `i + 1` is not submitted until
//! batch `i` has confirmed *and* been appended to the ledger. A run that
//! stops at batch `k` therefore leaves exactly batches `0..k` in the ledger,
//! and the next run's diff recomputes everything from batch `k` on.
//!
//! ## In-flight journal
//!
//! Around every transfer the orchestrator writes `submitted` / `confirmed`
//! markers to the [`InFlightJournal`] and clears them once the batch is
//! committed. What happens to the markers when a transfer fails depends on
//! what is known about it:
//!
//! - definite failure, no leg of the batch confirmed: cleared, the batch is
//!   known unpaid and the next run may resubmit it.
//! - ambiguous failure, or an earlier leg already confirmed: kept, so the
//!   next run stops (or resubmits, per [`InFlightPolicy`]) instead of
//!   silently paying twice.
//!
//! A ledger append that fails after confirmation is reported as
//! [`DistributionError::UnrecordedPayment`] and logged at `error`.

use airdrop_client::{
    ApproveRequest, DisperseAdapter, DisperseError, MembershipSource, NativeDisperseRequest,
    TokenDisperseRequest,
};
use airdrop_core::{
    approval_idempotency_key, new_addresses, Address, Batch, DistributionResult, ProofRef,
    TokenAmount, TransferLeg,
};
use airdrop_ledger::{InFlightBatch, InFlightJournal, JournalRecord, LedgerStore};
use chrono::Utc;
use uuid::Uuid;

use crate::config::{DistributionConfig, InFlightPolicy};
use crate::error::DistributionError;
use crate::phase::RunPhase;
use crate::report::{AllowanceOutcome, RunPlan, RunReport};

/// Runs distributions against a membership source, a disperse adapter, and
/// a ledger store.
#[derive(Debug)]
pub struct Distributor<M, D, L> {
    config: DistributionConfig,
    membership: M,
    disperse: D,
    ledger: L,
    journal: InFlightJournal,
    phase: RunPhase,
}

impl<M, D, L> Distributor<M, D, L>
where
    M: MembershipSource,
    D: DisperseAdapter,
    L: LedgerStore,
{
    /// Validate `config` and assemble a distributor.
    pub fn new(
        config: DistributionConfig,
        membership: M,
        disperse: D,
        ledger: L,
        journal: InFlightJournal,
    ) -> Result<Self, DistributionError> {
        config.validate()?;
        Ok(Self {
            config,
            membership,
            disperse,
            ledger,
            journal,
            phase: RunPhase::Start,
        })
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn journal(&self) -> &InFlightJournal {
        &self.journal
    }

    fn enter(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal run phase transition {} -> {next}",
            self.phase
        );
        tracing::info!(phase = %next, "run phase");
        self.phase = next;
    }

    /// Refuse to start while an earlier run may have paid an unrecorded batch.
    ///
    /// Journal entries whose recipients are all already in the ledger are
    /// leftovers of a committed batch and are cleared silently.
    pub fn check_in_flight(&self) -> Result<(), DistributionError> {
        let pending = self.journal.pending().map_err(DistributionError::Journal)?;
        if pending.is_empty() {
            return Ok(());
        }

        let loaded = self.ledger.load().map_err(|source| DistributionError::LedgerRead {
            location: self.ledger.location(),
            source,
        })?;
        let paid = loaded.ledger.address_set();
        let open: Vec<InFlightBatch> = pending
            .into_iter()
            .filter(|b| b.recipients.is_empty() || !b.recipients.iter().all(|r| paid.contains(r)))
            .collect();

        if open.is_empty() {
            tracing::info!(
                journal = %self.journal.location(),
                "in-flight journal only references committed batches; clearing"
            );
            return self.journal.clear().map_err(DistributionError::Journal);
        }

        for batch in &open {
            tracing::warn!(
                run_id = %batch.run_id,
                batch = batch.batch + 1,
                recipients = %join(&batch.recipients),
                confirmed = %join(&batch.confirmed_proofs()),
                unconfirmed_legs = ?batch.unconfirmed_legs(),
                since = %batch.first_seen,
                "unresolved in-flight batch"
            );
        }

        match self.config.in_flight_policy {
            InFlightPolicy::Halt => Err(DistributionError::InFlightUnresolved {
                journal: self.journal.location(),
                batches: open,
            }),
            InFlightPolicy::Resubmit => {
                tracing::warn!(
                    batches = open.len(),
                    "in_flight_policy=resubmit: discarding in-flight markers; these recipients \
                     may be paid again"
                );
                self.journal.clear().map_err(DistributionError::Journal)
            }
        }
    }

    /// Fetch, load, and diff without transferring anything.
    pub async fn plan(&mut self) -> Result<RunPlan, DistributionError> {
        self.phase = RunPhase::Start;
        self.enter(RunPhase::FetchingMembership);
        let snapshot = self
            .membership
            .role_members(&self.config.community_id, self.config.role_id)
            .await?;

        self.enter(RunPhase::LoadingLedger);
        let loaded = self.ledger.load().map_err(|source| DistributionError::LedgerRead {
            location: self.ledger.location(),
            source,
        })?;

        self.enter(RunPhase::Diffing);
        let fresh = new_addresses(&snapshot, &loaded.ledger);
        let token_total = self.config.token_amount.checked_total(fresh.len())?;
        let native_total = self
            .config
            .native_leg()
            .map(|each| each.checked_total(fresh.len()))
            .transpose()?;
        let batch_size = self.config.max_batch_size()?;

        tracing::info!(
            community = %self.config.community_id,
            role_id = self.config.role_id,
            snapshot = snapshot.len(),
            ledger = loaded.ledger.len(),
            new = fresh.len(),
            batches = airdrop_core::batch_count(fresh.len(), batch_size),
            "computed distribution diff"
        );

        Ok(RunPlan {
            snapshot_size: snapshot.len(),
            ledger_size: loaded.ledger.len(),
            ledger_report: loaded.report,
            new_addresses: fresh,
            batch_size,
            token_total,
            native_total,
        })
    }

    /// Execute a full run.
    pub async fn run(&mut self) -> Result<RunReport, DistributionError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.phase = RunPhase::Start;
        tracing::info!(%run_id, adapter = self.disperse.adapter_name(), "starting distribution run");

        match self.execute(run_id, started_at).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.enter(RunPhase::Failed);
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<RunReport, DistributionError> {
        self.check_in_flight()?;
        let plan = self.plan().await?;

        let mut report = RunReport {
            run_id,
            adapter: self.disperse.adapter_name().to_string(),
            started_at,
            finished_at: started_at,
            snapshot_size: plan.snapshot_size,
            ledger_size: plan.ledger_size,
            new_addresses: plan.new_addresses.len(),
            batches: Vec::with_capacity(plan.batch_count()),
            allowance: AllowanceOutcome::NotNeeded,
            phase: RunPhase::Done,
        };

        if plan.is_empty() {
            tracing::info!("no new addresses; nothing to distribute");
            self.enter(RunPhase::Done);
            report.finished_at = Utc::now();
            return Ok(report);
        }

        report.allowance = self.authorize(plan.token_total).await;

        for batch in plan.batches() {
            self.enter(RunPhase::Dispersing(batch.index));
            let result = self.disperse_batch(run_id, &batch).await?;
            self.enter(RunPhase::Committing(batch.index));
            self.commit(&result)?;
            report.batches.push(result);
        }

        self.enter(RunPhase::Done);
        report.finished_at = Utc::now();
        tracing::info!(
            %run_id,
            batches = report.batches.len(),
            paid = report.paid(),
            "distribution run complete"
        );
        Ok(report)
    }

    /// Make sure the disperse contract may spend `required`. Never fails the
    /// run; a missing allowance surfaces as a failed token transfer instead.
    async fn authorize(&mut self, required: TokenAmount) -> AllowanceOutcome {
        self.enter(RunPhase::Authorizing);
        let cfg = &self.config;

        let current = match self
            .disperse
            .token_allowance(&cfg.token_address, &cfg.sender, &cfg.disperse_contract)
            .await
        {
            Ok(current) if current >= required => {
                tracing::info!(%current, %required, "existing allowance covers the run");
                return AllowanceOutcome::Sufficient { current, required };
            }
            Ok(current) => Some(current),
            Err(e) => {
                tracing::warn!(error = %e, "allowance query failed; approving anyway");
                None
            }
        };

        let request = ApproveRequest {
            token: cfg.token_address.clone(),
            spender: cfg.disperse_contract.clone(),
            amount: required,
            idempotency_key: approval_idempotency_key(
                &cfg.token_address,
                &cfg.disperse_contract,
                current.unwrap_or(TokenAmount::ZERO),
                required,
            ),
        };

        match self.disperse.approve(&request).await {
            Ok(confirmation) => {
                tracing::info!(%required, proof = %confirmation.proof, "allowance approved");
                AllowanceOutcome::Approved {
                    previous: current,
                    required,
                    proof: confirmation.proof,
                }
            }
            Err(e) => {
                tracing::warn!(
                    %required,
                    error = %e,
                    "allowance approval failed; continuing, transfers may fail"
                );
                AllowanceOutcome::Failed {
                    required,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Submit every leg of `batch` and wait for each to confirm.
    async fn disperse_batch(
        &self,
        run_id: Uuid,
        batch: &Batch,
    ) -> Result<DistributionResult, DistributionError> {
        let cfg = &self.config;

        // Build both requests up front so an amount error cannot strike
        // between legs.
        let token_request = TokenDisperseRequest {
            contract: cfg.disperse_contract.clone(),
            token: cfg.token_address.clone(),
            recipients: batch.recipients.clone(),
            values: vec![cfg.token_amount; batch.len()],
            idempotency_key: batch.idempotency_key(
                TransferLeg::Token,
                Some(&cfg.token_address),
                cfg.token_amount,
            ),
        };
        let native_request = match cfg.native_leg() {
            Some(each) => Some(NativeDisperseRequest {
                contract: cfg.disperse_contract.clone(),
                recipients: batch.recipients.clone(),
                values: vec![each; batch.len()],
                total_value: each.checked_total(batch.len())?,
                idempotency_key: batch.idempotency_key(TransferLeg::Native, None, each),
            }),
            None => None,
        };

        self.record_submitted(run_id, batch, TransferLeg::Token, &token_request.idempotency_key)?;
        tracing::info!(
            batch = batch.number(),
            leg = %TransferLeg::Token,
            recipients = batch.len(),
            "submitting transfer"
        );
        let token_proof = match self.disperse.disperse_token(&token_request).await {
            Ok(c) => c.proof,
            Err(e) => return Err(self.transfer_failed(batch, TransferLeg::Token, Vec::new(), e)),
        };
        self.record_confirmed(run_id, batch, TransferLeg::Token, &token_proof);

        let native_proof = match native_request {
            None => None,
            Some(request) => {
                self.record_submitted(run_id, batch, TransferLeg::Native, &request.idempotency_key)?;
                tracing::info!(
                    batch = batch.number(),
                    leg = %TransferLeg::Native,
                    recipients = batch.len(),
                    total = %request.total_value,
                    "submitting transfer"
                );
                match self.disperse.disperse_native(&request).await {
                    Ok(c) => {
                        self.record_confirmed(run_id, batch, TransferLeg::Native, &c.proof);
                        Some(c.proof)
                    }
                    Err(e) => {
                        return Err(self.transfer_failed(
                            batch,
                            TransferLeg::Native,
                            vec![token_proof],
                            e,
                        ))
                    }
                }
            }
        };

        Ok(DistributionResult {
            batch: batch.index,
            recipients: batch.recipients.clone(),
            token_proof,
            native_proof,
        })
    }

    /// Append a confirmed batch to the ledger, then drop its journal markers.
    fn commit(&self, result: &DistributionResult) -> Result<(), DistributionError> {
        let entries = result.ledger_entries();
        if let Err(source) = self.ledger.append(&entries) {
            tracing::error!(
                batch = result.batch + 1,
                recipients = %join(&result.recipients),
                proofs = %join(&result.proofs()),
                ledger = %self.ledger.location(),
                journal = %self.journal.location(),
                error = %source,
                "UNRECORDED PAYMENT: transfers confirmed but the ledger append failed; \
                 reconcile manually before the next run"
            );
            return Err(DistributionError::UnrecordedPayment {
                batch: result.batch,
                proofs: result.proofs(),
                recipients: result.recipients.clone(),
                source,
            });
        }

        self.journal.clear().map_err(DistributionError::Journal)?;
        tracing::info!(
            batch = result.batch + 1,
            recipients = result.recipients.len(),
            proofs = %join(&result.proofs()),
            "batch committed to ledger"
        );
        Ok(())
    }

    fn record_submitted(
        &self,
        run_id: Uuid,
        batch: &Batch,
        leg: TransferLeg,
        idempotency_key: &str,
    ) -> Result<(), DistributionError> {
        self.journal
            .record(&JournalRecord::Submitted {
                run_id,
                batch: batch.index,
                leg,
                recipients: batch.recipients.clone(),
                idempotency_key: idempotency_key.to_string(),
                at: Utc::now(),
            })
            .map_err(DistributionError::Journal)
    }

    /// Failing to note a confirmation must not stop the ledger commit that
    /// follows, so this only logs.
    fn record_confirmed(&self, run_id: Uuid, batch: &Batch, leg: TransferLeg, proof: &ProofRef) {
        tracing::info!(batch = batch.number(), %leg, %proof, "transfer confirmed");
        let record = JournalRecord::Confirmed {
            run_id,
            batch: batch.index,
            leg,
            proof: proof.clone(),
            at: Utc::now(),
        };
        if let Err(e) = self.journal.record(&record) {
            tracing::error!(batch = batch.number(), %leg, %proof, error = %e, "failed to journal confirmation");
        }
    }

    fn transfer_failed(
        &self,
        batch: &Batch,
        leg: TransferLeg,
        confirmed: Vec<ProofRef>,
        source: DisperseError,
    ) -> DistributionError {
        if source.is_definite() && confirmed.is_empty() {
            match self.journal.clear() {
                Ok(()) => tracing::info!(batch = batch.number(), "batch known unpaid; in-flight markers cleared"),
                Err(e) => tracing::warn!(batch = batch.number(), error = %e, "failed to clear in-flight journal"),
            }
        } else {
            tracing::warn!(
                batch = batch.number(),
                journal = %self.journal.location(),
                confirmed = %join(&confirmed),
                "transfer outcome unknown or batch partially paid; in-flight journal kept"
            );
        }
        tracing::error!(
            batch = batch.number(),
            %leg,
            recipients = %join(&batch.recipients),
            error = %source,
            "transfer failed; stopping run"
        );
        DistributionError::Transfer {
            batch: batch.index,
            leg,
            recipients: batch.recipients.clone(),
            confirmed,
            source,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Ledger entries for an in-flight batch the operator confirms as paid.
///
/// Proofs already confirmed in the journal come first, then `extra_proofs`.
pub fn resolve_paid(batch: &InFlightBatch, extra_proofs: &[ProofRef]) -> Vec<airdrop_core::LedgerEntry> {
    let mut proofs = batch.confirmed_proofs();
    for p in extra_proofs {
        if !proofs.contains(p) {
            proofs.push(p.clone());
        }
    }
    batch
        .recipients
        .iter()
        .map(|a: &Address| airdrop_core::LedgerEntry::with_proofs(a.clone(), proofs.clone()))
        .collect()
}
