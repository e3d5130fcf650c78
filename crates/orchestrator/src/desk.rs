//! The action desk: one entry point per view.
//!
//! [`ActionDesk`] is where every invocation starts and ends. It consults the
//! gate, takes the submission latch, hands the request to the reconciler,
//! sequences the letter, and turns whatever happened into a [`Notice`] and an
//! [`Invocation`] report. Errors stop here; callers never see a `Result`.

use std::collections::BTreeSet;
use std::sync::Arc;

use lgdesk_interchange::{
    ActionOutcome, ApprovalRequestId, DocumentRef, InstructionId, LgId, LgRecord,
};
use lgdesk_storage::{RecordView, RefreshMode, ReloadSummary};
use serde::Serialize;

use crate::authority::Authority;
use crate::catalog::{self, ActionKind};
use crate::error::{ActionError, SideEffectError};
use crate::executor::Executor;
use crate::gate::{Gate, SubscriptionSource};
use crate::latch::SubmissionLatch;
use crate::notify::{Notice, NoticeLevel, Notifier};
use crate::payload::{ActionRequest, ActionTarget};
use crate::reconcile::Reconciler;
use crate::sequencer::{CommittedLetter, LetterPresenter, Sequencer};
use crate::settings::DeskSettings;

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationStatus {
    Applied,
    Pending {
        approval_request_id: ApprovalRequestId,
    },
    /// Turned away locally; nothing was sent.
    Refused {
        kind: &'static str,
    },
    /// Sent, or attempted, and did not take effect.
    Failed {
        kind: &'static str,
    },
}

impl InvocationStatus {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            InvocationStatus::Applied | InvocationStatus::Pending { .. }
        )
    }
}

/// Everything one invocation produced.
#[derive(Debug, Clone, Serialize)]
pub struct Invocation {
    pub action: ActionKind,
    pub target: String,
    pub status: InvocationStatus,
    pub notice: Notice,
    /// The record as the view now holds it, when the action touched one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<LgRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<DocumentRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub side_effect_errors: Vec<SideEffectError>,
    #[serde(skip)]
    pub error: Option<ActionError>,
}

/// Wires gate, executor, reconciler and sequencer for one view.
pub struct ActionDesk {
    reconciler: Reconciler,
    sequencer: Sequencer,
    notifier: Arc<dyn Notifier>,
    latch: SubmissionLatch,
}

impl ActionDesk {
    pub fn new(
        view: Arc<dyn RecordView>,
        authority: Arc<dyn Authority>,
        subscription: Arc<dyn SubscriptionSource>,
        presenter: Arc<dyn LetterPresenter>,
        notifier: Arc<dyn Notifier>,
        settings: &DeskSettings,
    ) -> Self {
        let executor = Executor::new(authority, Gate::new(subscription));
        ActionDesk {
            reconciler: Reconciler::new(view, executor.clone()),
            sequencer: Sequencer::new(executor, presenter, settings),
            notifier,
            latch: SubmissionLatch::new(),
        }
    }

    pub fn view(&self) -> &Arc<dyn RecordView> {
        self.reconciler.view()
    }

    pub fn gate(&self) -> &Gate {
        self.reconciler.executor().gate()
    }

    pub fn latch(&self) -> &SubmissionLatch {
        &self.latch
    }

    // ── Offering actions ────────────────────────────────────────────────────

    /// Actions to offer for a cached record. Empty while mutations are gated.
    pub async fn record_actions(&self, id: LgId) -> BTreeSet<ActionKind> {
        if !self.gate().allows_mutation() {
            return BTreeSet::new();
        }
        match self.view().get(id).await {
            Some(record) => catalog::record_actions(&record),
            None => BTreeSet::new(),
        }
    }

    /// Actions to offer for one instruction of a cached record.
    pub async fn instruction_actions(
        &self,
        lg_id: LgId,
        instruction_id: InstructionId,
    ) -> BTreeSet<ActionKind> {
        if !self.gate().allows_mutation() {
            return BTreeSet::new();
        }
        let Some(record) = self.view().get(lg_id).await else {
            return BTreeSet::new();
        };
        match record.instruction(instruction_id) {
            Some(instruction) => catalog::instruction_actions(&record, instruction),
            None => BTreeSet::new(),
        }
    }

    // ── Reloads ─────────────────────────────────────────────────────────────

    /// Reload the view. A failure is notified and kept on the view status.
    pub async fn refresh(&self, mode: RefreshMode) -> Result<ReloadSummary, ActionError> {
        let result = self.reconciler.reload(mode).await;
        if let Err(e) = &result {
            self.notifier.notify(Notice::new(
                NoticeLevel::Error,
                None,
                format!("Could not load LG records: {}", e.user_message()),
            ));
        }
        result
    }

    // ── Invocation ──────────────────────────────────────────────────────────

    /// Run one action end to end.
    pub async fn invoke(&self, request: ActionRequest) -> Invocation {
        let action = request.kind();
        let target = request.target();

        if let Err(e) = self.gate().check(action) {
            return self.finish_error(action, target, e);
        }
        let guard = match self.latch.acquire(target, action) {
            Ok(guard) => guard,
            Err(e) => return self.finish_error(action, target, e),
        };

        let invocation = match target {
            ActionTarget::Record(_) => self.invoke_record(&request).await,
            ActionTarget::Instruction { .. } => self.invoke_instruction(&request).await,
            ActionTarget::Portfolio => self.invoke_bulk_renewal().await,
        };
        // Held through the letter step: one busy window per invocation.
        drop(guard);
        invocation
    }

    async fn invoke_record(&self, request: &ActionRequest) -> Invocation {
        let action = request.kind();
        let target = request.target();

        let reconciled = match self.reconciler.apply(request).await {
            Ok(r) => r,
            Err(e) => return self.finish_error(action, target, e),
        };
        let letter = reconciled.letter();
        let record = reconciled.outcome.record().cloned();

        let (status, message) = match &reconciled.outcome {
            ActionOutcome::Applied { message, .. } => (
                InvocationStatus::Applied,
                message
                    .clone()
                    .unwrap_or_else(|| format!("{} completed for {}", action, target)),
            ),
            ActionOutcome::Pending {
                approval_request_id,
                message,
                ..
            } => {
                let base = message
                    .clone()
                    .unwrap_or_else(|| format!("{} for {} was submitted for approval", action, target));
                (
                    InvocationStatus::Pending {
                        approval_request_id: *approval_request_id,
                    },
                    format!(
                        "{}. Approval request ID: {}",
                        base.trim_end_matches('.'),
                        approval_request_id
                    ),
                )
            }
        };
        let level = match status {
            InvocationStatus::Pending { .. } => NoticeLevel::Info,
            _ => NoticeLevel::Success,
        };
        self.finish_success(action, target, status, level, message, record, letter, Vec::new())
            .await
    }

    async fn invoke_instruction(&self, request: &ActionRequest) -> Invocation {
        let action = request.kind();
        let target = request.target();

        let reconciled = match self.reconciler.apply_instruction(request).await {
            Ok(r) => r,
            Err(e) => return self.finish_error(action, target, e),
        };
        let letter = reconciled.letter();
        let message = reconciled
            .outcome
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} completed for {}", action, target));
        let record = match target.lg_id() {
            Some(id) if reconciled.receipt.is_some() => self.view().get(id).await,
            _ => None,
        };
        let side_effects = reconciled.refresh_error.into_iter().collect();

        self.finish_success(
            action,
            target,
            InvocationStatus::Applied,
            NoticeLevel::Success,
            message,
            record,
            letter,
            side_effects,
        )
        .await
    }

    async fn invoke_bulk_renewal(&self) -> Invocation {
        let action = ActionKind::RunBulkRenewal;
        let target = ActionTarget::Portfolio;

        let reconciled = match self.reconciler.run_bulk_renewal().await {
            Ok(r) => r,
            Err(e) => return self.finish_error(action, target, e),
        };
        let message = match (&reconciled.receipt.message, reconciled.receipt.renewed_count) {
            (Some(message), _) => message.clone(),
            (None, Some(count)) => format!("Bulk renewal completed: {} LGs renewed", count),
            (None, None) => "Bulk renewal completed".to_string(),
        };
        let side_effects = reconciled.reload.err().into_iter().collect();

        self.finish_success(
            action,
            target,
            InvocationStatus::Applied,
            NoticeLevel::Success,
            message,
            None,
            None,
            side_effects,
        )
        .await
    }

    // ── Reporting ───────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    async fn finish_success(
        &self,
        action: ActionKind,
        target: ActionTarget,
        status: InvocationStatus,
        level: NoticeLevel,
        message: String,
        record: Option<LgRecord>,
        letter: Option<CommittedLetter>,
        mut side_effect_errors: Vec<SideEffectError>,
    ) -> Invocation {
        let notice = Notice::new(level, Some(action), message);
        self.notifier.notify(notice.clone());

        let mut opened = None;
        if let Some(letter) = letter {
            match self.sequencer.open(letter).await {
                Ok(doc) => opened = doc,
                Err(e) => side_effect_errors.push(e),
            }
        }
        for e in &side_effect_errors {
            self.notifier
                .notify(Notice::new(NoticeLevel::Warning, Some(action), e.to_string()));
        }

        Invocation {
            action,
            target: target.to_string(),
            status,
            notice,
            record,
            letter: opened,
            side_effect_errors,
            error: None,
        }
    }

    fn finish_error(&self, action: ActionKind, target: ActionTarget, error: ActionError) -> Invocation {
        let kind = error.kind_label();
        let (status, level) = if error.is_refusal() {
            (InvocationStatus::Refused { kind }, NoticeLevel::Warning)
        } else {
            (InvocationStatus::Failed { kind }, NoticeLevel::Error)
        };
        let field = match &error {
            ActionError::Validation { field, .. } => field.clone(),
            _ => None,
        };
        tracing::debug!(%action, %target, kind, "invocation did not take effect");

        let notice = Notice::new(level, Some(action), error.user_message()).with_field(field);
        self.notifier.notify(notice.clone());
        Invocation {
            action,
            target: target.to_string(),
            status,
            notice,
            record: None,
            letter: None,
            side_effect_errors: Vec::new(),
            error: Some(error),
        }
    }
}
