//! State reconciler: brings a view in line with what the authority did.
//!
//! One reconciler serves one [`RecordView`]. Which strategy runs is decided
//! by [`ActionKind::reconciliation`]:
//!
//! - confirm-after-response: nothing changes locally until the authority
//!   answers; an applied outcome replaces the record by id
//! - optimistic-with-rollback: the toggle flips locally first and is either
//!   replaced by the server copy or restored from its snapshot
//! - background reload: portfolio-wide actions refetch the whole view
//!
//! Every local write goes through [`RecordView::patch`] and yields a
//! [`PatchReceipt`]; letters are only opened from a receipt.

use std::sync::Arc;

use lgdesk_interchange::{ActionOutcome, BulkRenewalReceipt, LgId, LgRecord};
use lgdesk_storage::{PatchReceipt, RecordView, RefreshMode, ReloadSummary, ViewScope};

use crate::catalog::{ensure_record_action, ActionKind, Reconciliation};
use crate::error::{ActionError, SideEffectError};
use crate::executor::{Executor, InstructionOutcome};
use crate::payload::{validate, ActionPayload, ActionRequest, ActionTarget};
use crate::sequencer::CommittedLetter;

/// A record-level action that took effect or was queued.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub outcome: ActionOutcome,
    /// Set when a record was written to the view.
    pub receipt: Option<PatchReceipt>,
}

impl Reconciled {
    /// The letter to open, available only once the applied record is committed.
    pub fn letter(&self) -> Option<CommittedLetter> {
        let instruction_id = self.outcome.letter_to_open()?;
        let receipt = self.receipt.clone()?;
        Some(CommittedLetter::new(receipt, instruction_id))
    }
}

/// An instruction-level action that took effect.
#[derive(Debug, Clone)]
pub struct InstructionReconciled {
    pub outcome: InstructionOutcome,
    pub receipt: Option<PatchReceipt>,
    /// The record could not be re-fetched after the action.
    pub refresh_error: Option<SideEffectError>,
}

impl InstructionReconciled {
    pub fn letter(&self) -> Option<CommittedLetter> {
        let instruction_id = self.outcome.letter_to_open()?;
        let receipt = self.receipt.clone()?;
        Some(CommittedLetter::new(receipt, instruction_id))
    }
}

/// The portfolio-wide renewal run and the reload that followed it.
#[derive(Debug, Clone)]
pub struct BulkReconciled {
    pub receipt: BulkRenewalReceipt,
    pub reload: Result<ReloadSummary, SideEffectError>,
}

/// Reconciles actions against one view.
#[derive(Clone)]
pub struct Reconciler {
    view: Arc<dyn RecordView>,
    executor: Executor,
}

impl Reconciler {
    pub fn new(view: Arc<dyn RecordView>, executor: Executor) -> Self {
        Reconciler { view, executor }
    }

    pub fn view(&self) -> &Arc<dyn RecordView> {
        &self.view
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    async fn cached(&self, id: LgId) -> Result<LgRecord, ActionError> {
        self.view
            .get(id)
            .await
            .ok_or_else(|| ActionError::RecordNotCached {
                lg_id: id,
                scope: self.view.scope().to_string(),
            })
    }

    /// Run a record-level action and reconcile the view.
    pub async fn apply(&self, request: &ActionRequest) -> Result<Reconciled, ActionError> {
        let lg_id = match request.target() {
            ActionTarget::Record(id) => id,
            other => {
                return Err(ActionError::TargetMismatch {
                    action: request.kind(),
                    target: other.to_string(),
                })
            }
        };
        let target = self.cached(lg_id).await?;

        match request.kind().reconciliation() {
            Reconciliation::OptimisticWithRollback => self.optimistic(request, target).await,
            Reconciliation::ConfirmAfterResponse | Reconciliation::BackgroundReload => {
                self.confirm(request, target).await
            }
        }
    }

    /// Confirm-after-response: the view is untouched until the outcome is known.
    async fn confirm(
        &self,
        request: &ActionRequest,
        target: LgRecord,
    ) -> Result<Reconciled, ActionError> {
        let outcome = self.executor.execute(request, &target).await?;
        let receipt = match outcome.record() {
            Some(record) => self.commit(request.kind(), record.clone()).await,
            None => None,
        };
        Ok(Reconciled { outcome, receipt })
    }

    /// Optimistic-with-rollback for the auto-renewal toggle.
    ///
    /// The pre-checks run against the snapshot before anything is flipped,
    /// so a refused toggle never shows a local change.
    async fn optimistic(
        &self,
        request: &ActionRequest,
        snapshot: LgRecord,
    ) -> Result<Reconciled, ActionError> {
        let action = request.kind();
        let enable = match request.payload() {
            ActionPayload::ToggleAutoRenewal { enable, .. } => *enable,
            _ => return self.confirm(request, snapshot).await,
        };

        self.executor.gate().check(action)?;
        ensure_record_action(action, &snapshot)?;
        validate(request.payload(), Some(&snapshot), None)?;

        let mut optimistic = snapshot.clone();
        optimistic.auto_renewal = enable;
        self.view.patch(optimistic).await?;
        tracing::debug!(%action, lg_id = %snapshot.id, enable, "optimistic patch applied");

        match self.executor.execute(request, &snapshot).await {
            Ok(outcome) => {
                let receipt = match outcome.record() {
                    Some(record) => self.commit(action, record.clone()).await,
                    None => None,
                };
                Ok(Reconciled { outcome, receipt })
            }
            Err(err) => {
                let lg_id = snapshot.id;
                match self.view.patch(snapshot).await {
                    Ok(_) => tracing::warn!(
                        %action,
                        %lg_id,
                        kind = err.kind_label(),
                        "optimistic change rolled back"
                    ),
                    Err(e) => tracing::warn!(
                        %action,
                        %lg_id,
                        error = %e,
                        "rollback skipped: record left the view"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Run an instruction-level action, then refresh the owning record.
    pub async fn apply_instruction(
        &self,
        request: &ActionRequest,
    ) -> Result<InstructionReconciled, ActionError> {
        let lg_id = match request.target() {
            ActionTarget::Instruction { lg_id, .. } => lg_id,
            other => {
                return Err(ActionError::TargetMismatch {
                    action: request.kind(),
                    target: other.to_string(),
                })
            }
        };
        let record = self.cached(lg_id).await?;
        let outcome = self.executor.execute_instruction(request, &record).await?;

        let (receipt, refresh_error) = match self.executor.fetch_record(lg_id).await {
            Ok(fresh) => (self.commit(request.kind(), fresh).await, None),
            Err(e) => {
                tracing::warn!(action = %request.kind(), %lg_id, error = %e, "record refresh failed");
                (
                    None,
                    Some(SideEffectError::Refresh {
                        lg_id: Some(lg_id),
                        message: e.user_message(),
                    }),
                )
            }
        };

        Ok(InstructionReconciled {
            outcome,
            receipt,
            refresh_error,
        })
    }

    /// Run the bulk renewal, then reload the view in the background.
    pub async fn run_bulk_renewal(&self) -> Result<BulkReconciled, ActionError> {
        let receipt = self.executor.run_bulk_renewal().await?;
        let reload = self
            .reload(RefreshMode::Background)
            .await
            .map_err(|e| SideEffectError::Refresh {
                lg_id: None,
                message: e.user_message(),
            });
        Ok(BulkReconciled { receipt, reload })
    }

    /// Replace the view's contents with a fresh copy from the authority.
    ///
    /// Records patched while the fetch was in flight keep their patched copy.
    pub async fn reload(&self, mode: RefreshMode) -> Result<ReloadSummary, ActionError> {
        let ticket = self.view.begin_reload(mode).await;
        let fetched = match self.view.scope() {
            ViewScope::Detail(id) => self.executor.fetch_record(id).await.map(|r| vec![r]),
            ViewScope::List(_) => self.executor.fetch_records().await,
        };

        match fetched {
            Ok(records) => {
                let summary = self.view.finish_reload(ticket, records).await;
                tracing::debug!(
                    scope = %self.view.scope(),
                    total = summary.total,
                    preserved = summary.preserved_patches.len(),
                    "view reloaded"
                );
                Ok(summary)
            }
            Err(e) => {
                self.view.abort_reload(ticket, e.user_message()).await;
                tracing::warn!(scope = %self.view.scope(), kind = e.kind_label(), "view reload failed");
                Err(e)
            }
        }
    }

    /// Write a server copy into the view.
    ///
    /// A record that left the view in the meantime is not an action failure:
    /// the mutation already happened remotely.
    async fn commit(&self, action: ActionKind, record: LgRecord) -> Option<PatchReceipt> {
        let lg_id = record.id;
        match self.view.patch(record).await {
            Ok(receipt) => {
                tracing::info!(
                    %action,
                    %lg_id,
                    generation = receipt.generation(),
                    "record committed"
                );
                Some(receipt)
            }
            Err(e) => {
                tracing::warn!(%action, %lg_id, error = %e, "server copy not committed");
                None
            }
        }
    }
}
