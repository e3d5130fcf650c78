//! Error taxonomy of the action path.
//!
//! [`ActionError`] covers everything that stops a mutation; it is caught at
//! the invocation boundary ([`crate::desk::ActionDesk`]) and turned into a
//! notice. [`SideEffectError`] covers the letter-opening step that runs
//! after a mutation has already been committed and never implies the
//! mutation failed.

use lgdesk_interchange::{InstructionId, LgId, SubscriptionStatus, WireError};
use lgdesk_storage::StoreError;
use serde::Serialize;

use crate::catalog::ActionKind;

/// User-facing text shared by transport failures and error responses that
/// carry no message of their own.
pub const GENERIC_FAILURE: &str = "The request could not be completed. Please try again.";

/// Why an action did not take effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Blocked by the subscription gate before any network call.
    #[error(
        "{action} is unavailable while the subscription is in its grace period; renew the subscription to make changes"
    )]
    GateRefusal {
        action: ActionKind,
        subscription: SubscriptionStatus,
    },

    /// The catalog does not offer this action for the target's status.
    #[error("{action} is not available for LG {lg_id} in status {status}")]
    NotAvailable {
        action: ActionKind,
        lg_id: LgId,
        status: String,
    },

    /// The action is addressed to the wrong kind of target.
    #[error("{action} cannot be applied to {target}")]
    TargetMismatch { action: ActionKind, target: String },

    /// The same control already has a submission in flight.
    #[error("{action} is already being submitted for {target}")]
    AlreadySubmitting { action: ActionKind, target: String },

    /// The payload failed a local or remote pre-check.
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    /// A well-formed error response from the authority.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// The transport itself failed.
    #[error("network error: {message}")]
    Network { message: String },

    /// A 2xx response that matches no documented shape.
    #[error("unexpected response from the server: {message}")]
    MalformedResponse { message: String },

    /// The target record is not held by the view the action was issued from.
    #[error("LG {lg_id} is not loaded in view {scope}")]
    RecordNotCached { lg_id: LgId, scope: String },

    /// The target instruction does not belong to the target record.
    #[error("instruction {instruction_id} does not belong to LG {lg_id}")]
    UnknownInstruction {
        lg_id: LgId,
        instruction_id: InstructionId,
    },
}

impl ActionError {
    /// The text shown to the user.
    ///
    /// Network failures are rendered like message-less remote errors; the
    /// distinction is kept for logs only.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Network { .. } => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }

    /// Short machine label used as the `kind` field in logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            ActionError::GateRefusal { .. } => "gate_refusal",
            ActionError::NotAvailable { .. } => "not_available",
            ActionError::TargetMismatch { .. } => "target_mismatch",
            ActionError::AlreadySubmitting { .. } => "already_submitting",
            ActionError::Validation { .. } => "validation",
            ActionError::Remote { .. } => "remote",
            ActionError::Network { .. } => "network",
            ActionError::MalformedResponse { .. } => "malformed_response",
            ActionError::RecordNotCached { .. } => "record_not_cached",
            ActionError::UnknownInstruction { .. } => "unknown_instruction",
        }
    }

    /// Refusals are decided locally and never reach the authority.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ActionError::GateRefusal { .. }
                | ActionError::NotAvailable { .. }
                | ActionError::TargetMismatch { .. }
                | ActionError::AlreadySubmitting { .. }
        )
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        ActionError::Validation {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::RecordNotFound { lg_id, scope } | StoreError::OutsideScope { lg_id, scope } => {
                ActionError::RecordNotCached {
                    lg_id,
                    scope: scope.to_string(),
                }
            }
        }
    }
}

impl From<WireError> for ActionError {
    fn from(e: WireError) -> Self {
        ActionError::MalformedResponse {
            message: e.to_string(),
        }
    }
}

/// Failure of the post-commit letter step. Never rolls anything back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SideEffectError {
    #[error("could not mark instruction {instruction_id} as accessed for print: {message}")]
    MarkAccessed {
        instruction_id: InstructionId,
        message: String,
    },

    #[error("could not fetch the letter for instruction {instruction_id}: {message}")]
    FetchLetter {
        instruction_id: InstructionId,
        message: String,
    },

    #[error("could not open the letter for instruction {instruction_id}: {message}")]
    Present {
        instruction_id: InstructionId,
        message: String,
    },

    /// The committed record does not list the generated instruction as latest.
    #[error("the letter for instruction {instruction_id} was not opened: the saved record does not show it yet")]
    NotCommitted {
        instruction_id: InstructionId,
        lg_id: LgId,
    },

    /// The follow-up re-fetch of a record failed after its mutation succeeded.
    #[error("the change was saved but the list could not be refreshed: {message}")]
    Refresh { lg_id: Option<LgId>, message: String },
}
