//! Action catalog: which actions a record or instruction offers.
//!
//! Pure functions. No IO. The catalog answers "is this action meaningful
//! for this target right now?"; the subscription gate answers "are
//! mutations allowed at all?". Callers consult both.

use std::collections::BTreeSet;
use std::fmt;

use lgdesk_interchange::{InstructionType, LgInstruction, LgRecord, LgStatus};
use serde::Serialize;

use crate::error::ActionError;

/// Every mutating action the orchestrator knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Extend,
    Release,
    Liquidate,
    DecreaseAmount,
    ChangeOwner,
    ToggleAutoRenewal,
    RecordDelivery,
    RecordBankReply,
    SendReminder,
    RunBulkRenewal,
}

/// What an action is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionScope {
    Record,
    Instruction,
    Portfolio,
}

/// How the reconciler brings local state in line after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reconciliation {
    /// Busy indicator; no local change until the authority answers.
    ConfirmAfterResponse,
    /// Local change first; replaced by the server copy or rolled back.
    OptimisticWithRollback,
    /// Affects many records; followed by a background reload.
    BackgroundReload,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Extend,
        ActionKind::Release,
        ActionKind::Liquidate,
        ActionKind::DecreaseAmount,
        ActionKind::ChangeOwner,
        ActionKind::ToggleAutoRenewal,
        ActionKind::RecordDelivery,
        ActionKind::RecordBankReply,
        ActionKind::SendReminder,
        ActionKind::RunBulkRenewal,
    ];

    pub fn scope(self) -> ActionScope {
        match self {
            ActionKind::RecordDelivery | ActionKind::RecordBankReply | ActionKind::SendReminder => {
                ActionScope::Instruction
            }
            ActionKind::RunBulkRenewal => ActionScope::Portfolio,
            _ => ActionScope::Record,
        }
    }

    /// The toggle is the only optimistic action: a single reversible field
    /// flipped often enough that latency matters more than confirm-first.
    pub fn reconciliation(self) -> Reconciliation {
        match self {
            ActionKind::ToggleAutoRenewal => Reconciliation::OptimisticWithRollback,
            ActionKind::RunBulkRenewal => Reconciliation::BackgroundReload,
            _ => Reconciliation::ConfirmAfterResponse,
        }
    }

    /// Path segment of the authority endpoint for this action.
    pub fn endpoint_segment(self) -> &'static str {
        match self {
            ActionKind::Extend => "extend",
            ActionKind::Release => "release",
            ActionKind::Liquidate => "liquidate",
            ActionKind::DecreaseAmount => "decrease-amount",
            ActionKind::ChangeOwner => "change-owner",
            ActionKind::ToggleAutoRenewal => "toggle-auto-renewal",
            ActionKind::RecordDelivery => "record-delivery",
            ActionKind::RecordBankReply => "record-bank-reply",
            ActionKind::SendReminder => "send-reminder-to-bank",
            ActionKind::RunBulkRenewal => "bulk-renewal",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Extend => "Extend",
            ActionKind::Release => "Release",
            ActionKind::Liquidate => "Liquidate",
            ActionKind::DecreaseAmount => "Decrease amount",
            ActionKind::ChangeOwner => "Change owner",
            ActionKind::ToggleAutoRenewal => "Toggle auto-renewal",
            ActionKind::RecordDelivery => "Record delivery",
            ActionKind::RecordBankReply => "Record bank reply",
            ActionKind::SendReminder => "Send reminder",
            ActionKind::RunBulkRenewal => "Run bulk renewal",
        };
        write!(f, "{}", label)
    }
}

/// Record-level actions valid in `status`.
///
/// `ChangeOwner` is the one action not gated by lifecycle status: terminal
/// and unknown statuses still permit administrative reassignment.
pub fn available_actions(status: &LgStatus) -> BTreeSet<ActionKind> {
    let actions: &[ActionKind] = match status {
        LgStatus::Valid => &[
            ActionKind::Extend,
            ActionKind::Release,
            ActionKind::Liquidate,
            ActionKind::DecreaseAmount,
            ActionKind::ChangeOwner,
            ActionKind::ToggleAutoRenewal,
        ],
        LgStatus::Active => &[
            ActionKind::Release,
            ActionKind::Liquidate,
            ActionKind::DecreaseAmount,
            ActionKind::ChangeOwner,
        ],
        LgStatus::Expired
        | LgStatus::Released
        | LgStatus::Liquidated
        | LgStatus::NonOperative
        | LgStatus::Other(_) => &[ActionKind::ChangeOwner],
    };
    actions.iter().copied().collect()
}

/// Record-level actions for a cached record. Deleted records offer none.
pub fn record_actions(record: &LgRecord) -> BTreeSet<ActionKind> {
    if record.is_deleted {
        return BTreeSet::new();
    }
    available_actions(&record.status)
}

/// Instruction-level actions for one instruction of `record`.
///
/// Delivery is recorded once; a bank reply can only follow delivery; a
/// reminder chases a delivered, unanswered instruction and is never sent
/// about another reminder.
pub fn instruction_actions(record: &LgRecord, instruction: &LgInstruction) -> BTreeSet<ActionKind> {
    let mut actions = BTreeSet::new();
    if record.is_deleted {
        return actions;
    }
    if !instruction.is_delivered() {
        actions.insert(ActionKind::RecordDelivery);
    } else if !instruction.has_bank_reply() {
        actions.insert(ActionKind::RecordBankReply);
        if instruction.instruction_type != InstructionType::Reminder {
            actions.insert(ActionKind::SendReminder);
        }
    }
    actions
}

/// Refuse a record-level action the catalog does not offer for `record`.
pub fn ensure_record_action(action: ActionKind, record: &LgRecord) -> Result<(), ActionError> {
    if record_actions(record).contains(&action) {
        return Ok(());
    }
    let status = if record.is_deleted {
        "deleted".to_string()
    } else {
        record.status.to_string()
    };
    Err(ActionError::NotAvailable {
        action,
        lg_id: record.id,
        status,
    })
}

/// Refuse an instruction-level action the catalog does not offer.
pub fn ensure_instruction_action(
    action: ActionKind,
    record: &LgRecord,
    instruction: &LgInstruction,
) -> Result<(), ActionError> {
    if instruction_actions(record, instruction).contains(&action) {
        return Ok(());
    }
    let status = if record.is_deleted {
        "deleted"
    } else if !instruction.is_delivered() {
        "awaiting delivery"
    } else if !instruction.has_bank_reply() {
        "awaiting bank reply"
    } else {
        "answered by the bank"
    };
    Err(ActionError::NotAvailable {
        action,
        lg_id: record.id,
        status: format!("{} ({} {})", record.status, instruction.serial_number, status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(status: &str) -> LgRecord {
        serde_json::from_value(json!({
            "id": 1,
            "status": status,
            "amount": "10",
            "currency": "USD",
            "expiry_date": "2025-01-01",
            "owner_contact": {"name": "A", "email": "a@example.com"}
        }))
        .unwrap()
    }

    fn instruction(kind: &str, delivered: bool, replied: bool) -> LgInstruction {
        let delivery_date = if delivered { json!("2024-05-02") } else { json!(null) };
        let bank_reply_date = if replied { json!("2024-05-09") } else { json!(null) };
        serde_json::from_value(json!({
            "id": 5,
            "serial_number": "S-5",
            "instruction_type": kind,
            "instruction_date": "2024-05-01",
            "created_at": "2024-05-01T10:00:00Z",
            "delivery_date": delivery_date,
            "bank_reply_date": bank_reply_date
        }))
        .unwrap()
    }

    #[test]
    fn valid_offers_full_set() {
        let actions = available_actions(&LgStatus::Valid);
        assert_eq!(actions.len(), 6);
        assert!(actions.contains(&ActionKind::Extend));
        assert!(actions.contains(&ActionKind::ToggleAutoRenewal));
    }

    #[test]
    fn active_cannot_extend_or_toggle() {
        let actions = available_actions(&LgStatus::Active);
        assert!(!actions.contains(&ActionKind::Extend));
        assert!(!actions.contains(&ActionKind::ToggleAutoRenewal));
        assert!(actions.contains(&ActionKind::Liquidate));
    }

    #[test]
    fn change_owner_survives_every_status() {
        for status in [
            LgStatus::Valid,
            LgStatus::Active,
            LgStatus::Expired,
            LgStatus::Released,
            LgStatus::Liquidated,
            LgStatus::NonOperative,
            LgStatus::Other("Suspended".to_string()),
        ] {
            assert!(
                available_actions(&status).contains(&ActionKind::ChangeOwner),
                "ChangeOwner missing for {}",
                status
            );
        }
        for status in [LgStatus::Expired, LgStatus::Released, LgStatus::Liquidated] {
            assert_eq!(available_actions(&status).len(), 1);
        }
    }

    #[test]
    fn deleted_records_offer_nothing() {
        let mut deleted = record("Expired");
        deleted.is_deleted = true;
        assert!(record_actions(&deleted).is_empty());
        assert!(instruction_actions(&deleted, &instruction("extension", false, false)).is_empty());
    }

    #[test]
    fn instruction_actions_follow_delivery_and_reply() {
        let valid = record("Valid");
        assert_eq!(
            instruction_actions(&valid, &instruction("extension", false, false)),
            [ActionKind::RecordDelivery].into_iter().collect()
        );
        assert_eq!(
            instruction_actions(&valid, &instruction("extension", true, false)),
            [ActionKind::RecordBankReply, ActionKind::SendReminder]
                .into_iter()
                .collect()
        );
        assert_eq!(
            instruction_actions(&valid, &instruction("reminder", true, false)),
            [ActionKind::RecordBankReply].into_iter().collect()
        );
        assert!(instruction_actions(&valid, &instruction("extension", true, true)).is_empty());
    }

    #[test]
    fn only_the_toggle_is_optimistic() {
        let optimistic: Vec<ActionKind> = ActionKind::ALL
            .into_iter()
            .filter(|a| a.reconciliation() == Reconciliation::OptimisticWithRollback)
            .collect();
        assert_eq!(optimistic, vec![ActionKind::ToggleAutoRenewal]);
    }

    #[test]
    fn ensure_names_the_status() {
        let expired = record("Expired");
        let err = ensure_record_action(ActionKind::Extend, &expired).unwrap_err();
        assert_eq!(
            err,
            ActionError::NotAvailable {
                action: ActionKind::Extend,
                lg_id: expired.id,
                status: "Expired".to_string(),
            }
        );
        assert!(ensure_record_action(ActionKind::ChangeOwner, &expired).is_ok());

        let replied = instruction("extension", true, true);
        let err = ensure_instruction_action(ActionKind::SendReminder, &record("Valid"), &replied)
            .unwrap_err();
        assert!(err.to_string().contains("answered by the bank"));
    }
}
