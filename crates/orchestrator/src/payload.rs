//! Action payloads: what the user supplies, checked locally, shaped for the wire.
//!
//! An [`ActionRequest`] pairs a target with a payload. [`validate`] runs the
//! local pre-checks against the cached target; [`build_request`] produces the
//! authority request. Status-changing actions go out as JSON unless a
//! supporting document is attached; delivery and bank-reply recording are
//! always multipart.

use std::fmt;

use lgdesk_interchange::{InstructionId, LgId, LgInstruction, LgRecord, OwnerContact};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use time::Date;

use crate::authority::multipart::MAX_ATTACHMENT_BYTES;
use crate::authority::{paths, Attachment, MultipartForm, RemoteRequest};
use crate::catalog::{ActionKind, ActionScope};
use crate::error::ActionError;

/// Full or partial liquidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationKind {
    Full,
    /// Liquidate `amount`, leaving the remainder guaranteed.
    Partial { amount: Decimal },
}

/// The user's input for one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Extend {
        new_expiry_date: Date,
        notes: Option<String>,
    },
    Release {
        reason: Option<String>,
        document: Option<Attachment>,
    },
    Liquidate {
        kind: LiquidationKind,
        reason: Option<String>,
        document: Option<Attachment>,
    },
    /// Reduce the guaranteed amount by `decrease_by`.
    DecreaseAmount {
        decrease_by: Decimal,
        reason: Option<String>,
        document: Option<Attachment>,
    },
    ChangeOwner {
        owner: OwnerContact,
        reason: Option<String>,
    },
    ToggleAutoRenewal {
        enable: bool,
        reason: Option<String>,
    },
    RecordDelivery {
        delivery_date: Date,
        document: Option<Attachment>,
    },
    RecordBankReply {
        reply_date: Date,
        details: Option<String>,
        document: Option<Attachment>,
    },
    SendReminder,
    RunBulkRenewal,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Extend { .. } => ActionKind::Extend,
            ActionPayload::Release { .. } => ActionKind::Release,
            ActionPayload::Liquidate { .. } => ActionKind::Liquidate,
            ActionPayload::DecreaseAmount { .. } => ActionKind::DecreaseAmount,
            ActionPayload::ChangeOwner { .. } => ActionKind::ChangeOwner,
            ActionPayload::ToggleAutoRenewal { .. } => ActionKind::ToggleAutoRenewal,
            ActionPayload::RecordDelivery { .. } => ActionKind::RecordDelivery,
            ActionPayload::RecordBankReply { .. } => ActionKind::RecordBankReply,
            ActionPayload::SendReminder => ActionKind::SendReminder,
            ActionPayload::RunBulkRenewal => ActionKind::RunBulkRenewal,
        }
    }

    fn document(&self) -> Option<&Attachment> {
        match self {
            ActionPayload::Release { document, .. }
            | ActionPayload::Liquidate { document, .. }
            | ActionPayload::DecreaseAmount { document, .. }
            | ActionPayload::RecordDelivery { document, .. }
            | ActionPayload::RecordBankReply { document, .. } => document.as_ref(),
            _ => None,
        }
    }
}

/// What an action is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    Record(LgId),
    Instruction {
        lg_id: LgId,
        instruction_id: InstructionId,
    },
    Portfolio,
}

impl ActionTarget {
    pub fn scope(&self) -> ActionScope {
        match self {
            ActionTarget::Record(_) => ActionScope::Record,
            ActionTarget::Instruction { .. } => ActionScope::Instruction,
            ActionTarget::Portfolio => ActionScope::Portfolio,
        }
    }

    /// The record the action touches, if any.
    pub fn lg_id(&self) -> Option<LgId> {
        match self {
            ActionTarget::Record(id) | ActionTarget::Instruction { lg_id: id, .. } => Some(*id),
            ActionTarget::Portfolio => None,
        }
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Record(id) => write!(f, "LG {}", id),
            ActionTarget::Instruction {
                lg_id,
                instruction_id,
            } => write!(f, "instruction {} of LG {}", instruction_id, lg_id),
            ActionTarget::Portfolio => write!(f, "the portfolio"),
        }
    }
}

/// A payload addressed to a target of the matching scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    target: ActionTarget,
    payload: ActionPayload,
}

impl ActionRequest {
    /// Pair `payload` with `target`, refusing a scope mismatch.
    pub fn new(target: ActionTarget, payload: ActionPayload) -> Result<Self, ActionError> {
        let action = payload.kind();
        if action.scope() != target.scope() {
            return Err(ActionError::TargetMismatch {
                action,
                target: target.to_string(),
            });
        }
        Ok(ActionRequest { target, payload })
    }

    pub fn record(lg_id: LgId, payload: ActionPayload) -> Result<Self, ActionError> {
        Self::new(ActionTarget::Record(lg_id), payload)
    }

    pub fn instruction(
        lg_id: LgId,
        instruction_id: InstructionId,
        payload: ActionPayload,
    ) -> Result<Self, ActionError> {
        Self::new(
            ActionTarget::Instruction {
                lg_id,
                instruction_id,
            },
            payload,
        )
    }

    pub fn bulk_renewal() -> Self {
        ActionRequest {
            target: ActionTarget::Portfolio,
            payload: ActionPayload::RunBulkRenewal,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn target(&self) -> ActionTarget {
        self.target
    }

    pub fn payload(&self) -> &ActionPayload {
        &self.payload
    }
}

// ──────────────────────────────────────────────
// Local validation
// ──────────────────────────────────────────────

/// Check `payload` against the cached target before anything is sent.
///
/// `record` is required for record and instruction actions; `instruction`
/// for instruction actions.
pub fn validate(
    payload: &ActionPayload,
    record: Option<&LgRecord>,
    instruction: Option<&LgInstruction>,
) -> Result<(), ActionError> {
    if let Some(document) = payload.document() {
        validate_attachment(document)?;
    }

    match payload {
        ActionPayload::Extend {
            new_expiry_date, ..
        } => {
            if let Some(record) = record {
                if *new_expiry_date <= record.expiry_date {
                    return Err(ActionError::validation(
                        "new_expiry_date",
                        format!(
                            "New expiry date must be after the current expiry date ({})",
                            record.expiry_date
                        ),
                    ));
                }
            }
        }
        ActionPayload::Liquidate {
            kind: LiquidationKind::Partial { amount },
            ..
        } => {
            check_reduction("new_amount", *amount, record, "Partial liquidation amount")?;
        }
        ActionPayload::DecreaseAmount { decrease_by, .. } => {
            check_reduction("decrease_amount", *decrease_by, record, "Decrease amount")?;
        }
        ActionPayload::ChangeOwner { owner, .. } => {
            if owner.name.trim().is_empty() {
                return Err(ActionError::validation(
                    "new_owner_name",
                    "New owner name is required",
                ));
            }
            if !plausible_email(&owner.email) {
                return Err(ActionError::validation(
                    "new_owner_email",
                    format!("'{}' is not a valid e-mail address", owner.email.trim()),
                ));
            }
        }
        ActionPayload::ToggleAutoRenewal { enable, .. } => {
            if let Some(record) = record {
                if record.auto_renewal == *enable {
                    let state = if *enable { "enabled" } else { "disabled" };
                    return Err(ActionError::validation(
                        "auto_renewal",
                        format!("Auto-renewal is already {} for LG {}", state, record.id),
                    ));
                }
            }
        }
        ActionPayload::RecordDelivery { delivery_date, .. } => {
            if let Some(instruction) = instruction {
                if *delivery_date < instruction.instruction_date {
                    return Err(ActionError::validation(
                        "delivery_date",
                        format!(
                            "Delivery date cannot be before the instruction date ({})",
                            instruction.instruction_date
                        ),
                    ));
                }
            }
        }
        ActionPayload::RecordBankReply { reply_date, .. } => {
            if let Some(instruction) = instruction {
                let floor = instruction
                    .delivery_date
                    .unwrap_or(instruction.instruction_date);
                if *reply_date < floor {
                    return Err(ActionError::validation(
                        "bank_reply_date",
                        format!("Bank reply date cannot be before {}", floor),
                    ));
                }
            }
        }
        ActionPayload::Release { .. }
        | ActionPayload::Liquidate { .. }
        | ActionPayload::SendReminder
        | ActionPayload::RunBulkRenewal => {}
    }
    Ok(())
}

fn check_reduction(
    field: &str,
    amount: Decimal,
    record: Option<&LgRecord>,
    label: &str,
) -> Result<(), ActionError> {
    if amount <= Decimal::ZERO {
        return Err(ActionError::validation(
            field,
            format!("{} must be greater than zero", label),
        ));
    }
    if let Some(record) = record {
        if amount >= record.amount {
            return Err(ActionError::validation(
                field,
                format!(
                    "{} must be less than the current amount ({} {})",
                    label, record.amount, record.currency
                ),
            ));
        }
    }
    Ok(())
}

fn validate_attachment(document: &Attachment) -> Result<(), ActionError> {
    if document.bytes.is_empty() {
        return Err(ActionError::validation(
            "supporting_document",
            format!("'{}' is empty", document.file_name),
        ));
    }
    if document.bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(ActionError::validation(
            "supporting_document",
            format!("'{}' exceeds the 10 MB upload limit", document.file_name),
        ));
    }
    Ok(())
}

/// One `@`, something before it, a dotted domain after it, no whitespace.
fn plausible_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// ──────────────────────────────────────────────
// Request building
// ──────────────────────────────────────────────

/// A payload field before it is rendered as JSON or a form part.
enum Field {
    Text(String),
    Flag(bool),
}

impl Field {
    fn json(self) -> Value {
        match self {
            Field::Text(s) => Value::String(s),
            Field::Flag(b) => Value::Bool(b),
        }
    }

    fn text(self) -> String {
        match self {
            Field::Text(s) => s,
            Field::Flag(b) => b.to_string(),
        }
    }
}

struct Fields(Vec<(&'static str, Field)>);

impl Fields {
    fn new() -> Self {
        Fields(Vec::new())
    }

    fn text(mut self, name: &'static str, value: impl ToString) -> Self {
        self.0.push((name, Field::Text(value.to_string())));
        self
    }

    fn optional(self, name: &'static str, value: Option<&String>) -> Self {
        match value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    fn flag(mut self, name: &'static str, value: bool) -> Self {
        self.0.push((name, Field::Flag(value)));
        self
    }

    fn into_json(self) -> Value {
        let mut map = Map::new();
        for (name, field) in self.0 {
            map.insert(name.to_string(), field.json());
        }
        Value::Object(map)
    }

    fn into_form(self) -> MultipartForm {
        self.0
            .into_iter()
            .fold(MultipartForm::new(), |form, (name, field)| {
                form.text(name, field.text())
            })
    }
}

/// JSON unless a document is attached.
fn json_or_multipart(
    path: String,
    fields: Fields,
    document: Option<&Attachment>,
    file_field: &str,
) -> RemoteRequest {
    match document {
        Some(doc) => RemoteRequest::post_multipart(path, fields.into_form().file(file_field, doc.clone())),
        None => RemoteRequest::post_json(path, fields.into_json()),
    }
}

/// Always multipart, file part optional.
fn multipart(
    path: String,
    fields: Fields,
    document: Option<&Attachment>,
    file_field: &str,
) -> RemoteRequest {
    let form = fields.into_form();
    let form = match document {
        Some(doc) => form.file(file_field, doc.clone()),
        None => form,
    };
    RemoteRequest::post_multipart(path, form)
}

/// Shape `request` for the authority.
pub fn build_request(request: &ActionRequest) -> RemoteRequest {
    let action = request.kind();
    let segment = action.endpoint_segment();
    let path = match request.target() {
        ActionTarget::Record(lg_id) => paths::record_action(lg_id, segment),
        ActionTarget::Instruction { instruction_id, .. } => {
            paths::instruction_action(instruction_id, segment)
        }
        ActionTarget::Portfolio => paths::BULK_RENEWAL.to_string(),
    };

    match request.payload() {
        ActionPayload::Extend {
            new_expiry_date,
            notes,
        } => RemoteRequest::post_json(
            path,
            Fields::new()
                .text("new_expiry_date", new_expiry_date)
                .optional("notes", notes.as_ref())
                .into_json(),
        ),
        ActionPayload::Release { reason, document } => json_or_multipart(
            path,
            Fields::new().optional("reason", reason.as_ref()),
            document.as_ref(),
            "supporting_document",
        ),
        ActionPayload::Liquidate {
            kind,
            reason,
            document,
        } => {
            let fields = match kind {
                LiquidationKind::Full => Fields::new().text("liquidation_type", "full"),
                LiquidationKind::Partial { amount } => Fields::new()
                    .text("liquidation_type", "partial")
                    .text("new_amount", amount),
            };
            json_or_multipart(
                path,
                fields.optional("reason", reason.as_ref()),
                document.as_ref(),
                "supporting_document",
            )
        }
        ActionPayload::DecreaseAmount {
            decrease_by,
            reason,
            document,
        } => json_or_multipart(
            path,
            Fields::new()
                .text("decrease_amount", decrease_by)
                .optional("reason", reason.as_ref()),
            document.as_ref(),
            "supporting_document",
        ),
        ActionPayload::ChangeOwner { owner, reason } => RemoteRequest::post_json(
            path,
            Fields::new()
                .text("new_owner_name", owner.name.trim())
                .text("new_owner_email", owner.email.trim())
                .optional("new_owner_phone", owner.phone.as_ref())
                .optional("reason", reason.as_ref())
                .into_json(),
        ),
        ActionPayload::ToggleAutoRenewal { enable, reason } => RemoteRequest::post_json(
            path,
            Fields::new()
                .flag("auto_renewal", *enable)
                .optional("reason", reason.as_ref())
                .into_json(),
        ),
        ActionPayload::RecordDelivery {
            delivery_date,
            document,
        } => multipart(
            path,
            Fields::new().text("delivery_date", delivery_date),
            document.as_ref(),
            "delivery_document",
        ),
        ActionPayload::RecordBankReply {
            reply_date,
            details,
            document,
        } => multipart(
            path,
            Fields::new()
                .text("bank_reply_date", reply_date)
                .optional("reply_details", details.as_ref()),
            document.as_ref(),
            "bank_reply_document",
        ),
        ActionPayload::SendReminder | ActionPayload::RunBulkRenewal => {
            RemoteRequest::post_empty(path)
        }
    }
}
