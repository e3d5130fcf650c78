//! Post-action letter sequencer.
//!
//! Opening a generated letter is ordered strictly after the record that
//! names it has been committed to the view. The ordering is carried by the
//! type system: the only input is a [`CommittedLetter`], and the only way to
//! obtain one is from a [`PatchReceipt`] the view handed back.
//!
//! Steps, in order: mark the instruction accessed for print, fetch the
//! letter reference, present it. A failure at any step is reported on its
//! own and never undoes the committed change.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lgdesk_interchange::{DocumentRef, InstructionId};
use lgdesk_storage::PatchReceipt;

use crate::error::SideEffectError;
use crate::executor::Executor;
use crate::settings::DeskSettings;

/// A letter whose owning record is already committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedLetter {
    receipt: PatchReceipt,
    instruction_id: InstructionId,
}

impl CommittedLetter {
    pub(crate) fn new(receipt: PatchReceipt, instruction_id: InstructionId) -> Self {
        CommittedLetter {
            receipt,
            instruction_id,
        }
    }

    pub fn instruction_id(&self) -> InstructionId {
        self.instruction_id
    }
}

/// Presentation failed (e.g. no viewer could be opened).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PresentError(pub String);

/// Shows a letter to the user in a new viewing context.
#[async_trait]
pub trait LetterPresenter: Send + Sync {
    async fn present(&self, document: &DocumentRef) -> Result<(), PresentError>;
}

/// Keeps every presented letter, in order. Front ends print them afterwards.
#[derive(Default)]
pub struct CollectingPresenter {
    presented: Mutex<Vec<DocumentRef>>,
}

impl CollectingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> Vec<DocumentRef> {
        self.presented
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl LetterPresenter for CollectingPresenter {
    async fn present(&self, document: &DocumentRef) -> Result<(), PresentError> {
        self.presented
            .lock()
            .map_err(|_| PresentError("presenter state is unavailable".to_string()))?
            .push(document.clone());
        Ok(())
    }
}

/// Runs the letter steps for committed records.
pub struct Sequencer {
    executor: Executor,
    presenter: Arc<dyn LetterPresenter>,
    settle_delay: Duration,
    enabled: bool,
}

impl Sequencer {
    pub fn new(
        executor: Executor,
        presenter: Arc<dyn LetterPresenter>,
        settings: &DeskSettings,
    ) -> Self {
        Sequencer {
            executor,
            presenter,
            settle_delay: Duration::from_millis(settings.letter_open_delay_ms),
            enabled: settings.open_letters,
        }
    }

    /// Open the letter for `letter`. Returns `Ok(None)` when letter opening
    /// is switched off.
    pub async fn open(&self, letter: CommittedLetter) -> Result<Option<DocumentRef>, SideEffectError> {
        if !self.enabled {
            tracing::debug!(instruction_id = %letter.instruction_id, "letter opening disabled");
            return Ok(None);
        }
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let instruction_id = letter.instruction_id;
        if letter.receipt.latest_instruction_id() != Some(instruction_id) {
            tracing::warn!(
                %instruction_id,
                lg_id = %letter.receipt.lg_id(),
                committed_latest = ?letter.receipt.latest_instruction_id().map(|i| i.0),
                "committed record does not list the generated instruction as latest"
            );
            return Err(SideEffectError::NotCommitted {
                instruction_id,
                lg_id: letter.receipt.lg_id(),
            });
        }

        let result = self.run_steps(instruction_id).await;
        match &result {
            Ok(doc) => tracing::info!(%instruction_id, url = %doc.url, "letter opened"),
            Err(e) => tracing::warn!(%instruction_id, error = %e, "letter could not be opened"),
        }
        result.map(Some)
    }

    async fn run_steps(&self, instruction_id: InstructionId) -> Result<DocumentRef, SideEffectError> {
        self.executor
            .mark_accessed_for_print(instruction_id)
            .await
            .map_err(|e| SideEffectError::MarkAccessed {
                instruction_id,
                message: e.user_message(),
            })?;

        let document = self
            .executor
            .view_letter(instruction_id)
            .await
            .map_err(|e| SideEffectError::FetchLetter {
                instruction_id,
                message: e.user_message(),
            })?;

        self.presenter
            .present(&document)
            .await
            .map_err(|e| SideEffectError::Present {
                instruction_id,
                message: e.to_string(),
            })?;

        Ok(document)
    }
}
