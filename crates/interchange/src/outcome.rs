//! Tagged results of the authority's mutating endpoints.
//!
//! The record endpoints answer in one of two shapes, and the same action
//! can legitimately return either depending on the authority's
//! maker-checker configuration:
//!
//! - `{ "lg_record": {...}, "latest_instruction_id": 901? }`: applied
//! - `{ "approval_request_id": 77, "lg_record": {...}? }`: queued
//!
//! [`ActionOutcome::from_response`] is the only place that inspects which
//! shape arrived. Bodies that match neither, or both, are rejected.

use serde::Serialize;
use serde_json::Value;

use crate::deserialize::{
    as_object, id_value, optional_instruction_id, optional_string, parse_record, present,
    WireError,
};
use crate::types::{ApprovalRequestId, InstructionId, LgRecord};

/// Normalized result of a record-level mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The mutation took effect.
    Applied {
        record: LgRecord,
        /// Set when the action generated paperwork.
        latest_instruction_id: Option<InstructionId>,
        message: Option<String>,
    },
    /// The mutation is queued for a reviewer.
    Pending {
        approval_request_id: ApprovalRequestId,
        /// Provisional view of the record, when the authority offers one.
        provisional: Option<LgRecord>,
        message: Option<String>,
    },
}

impl ActionOutcome {
    /// Classify a 2xx response body.
    ///
    /// A non-null `approval_request_id` selects `Pending`; otherwise a
    /// parseable `lg_record` is required and selects `Applied`. A body
    /// naming both an approval request and a generated instruction is
    /// contradictory and fails closed.
    pub fn from_response(body: &Value) -> Result<Self, WireError> {
        let obj = as_object(body, "action")?;
        let message = optional_string(obj, "message");

        if let Some(raw_approval) = present(obj, "approval_request_id") {
            let approval_request_id =
                ApprovalRequestId(id_value("approval_request_id", raw_approval)?);
            if present(obj, "latest_instruction_id").is_some() {
                return Err(WireError::Ambiguous {
                    message: "both approval_request_id and latest_instruction_id are set"
                        .to_string(),
                });
            }
            let provisional = present(obj, "lg_record").map(parse_record).transpose()?;
            return Ok(ActionOutcome::Pending {
                approval_request_id,
                provisional,
                message,
            });
        }

        let record_value = present(obj, "lg_record").ok_or_else(|| WireError::MissingField {
            field: "lg_record".to_string(),
        })?;
        let record = parse_record(record_value)?;
        let latest_instruction_id = optional_instruction_id(obj, "latest_instruction_id")?;

        Ok(ActionOutcome::Applied {
            record,
            latest_instruction_id,
            message,
        })
    }

    /// The record the reconciler should install, if any.
    pub fn record(&self) -> Option<&LgRecord> {
        match self {
            ActionOutcome::Applied { record, .. } => Some(record),
            ActionOutcome::Pending { provisional, .. } => provisional.as_ref(),
        }
    }

    /// The instruction whose letter should be opened after commit.
    /// Always `None` for pending outcomes.
    pub fn letter_to_open(&self) -> Option<InstructionId> {
        match self {
            ActionOutcome::Applied {
                latest_instruction_id,
                ..
            } => *latest_instruction_id,
            ActionOutcome::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ActionOutcome::Pending { .. })
    }
}

/// Acknowledgement of a delivery or bank-reply recording. No approval branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAck {
    pub success: bool,
    pub message: Option<String>,
}

impl DeliveryAck {
    pub fn from_response(body: &Value) -> Result<Self, WireError> {
        let obj = as_object(body, "delivery")?;
        let success = present(obj, "success")
            .ok_or_else(|| WireError::MissingField {
                field: "success".to_string(),
            })?
            .as_bool()
            .ok_or_else(|| WireError::InvalidField {
                field: "success".to_string(),
                message: "expected a boolean".to_string(),
            })?;
        Ok(DeliveryAck {
            success,
            message: optional_string(obj, "message"),
        })
    }
}

/// Result of sending a reminder to the issuing bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReceipt {
    pub message: String,
    pub new_instruction_id: Option<InstructionId>,
}

impl ReminderReceipt {
    pub fn from_response(body: &Value) -> Result<Self, WireError> {
        let obj = as_object(body, "reminder")?;
        let message = optional_string(obj, "message").ok_or_else(|| WireError::MissingField {
            field: "message".to_string(),
        })?;
        Ok(ReminderReceipt {
            message,
            new_instruction_id: optional_instruction_id(obj, "new_instruction_id")?,
        })
    }
}

/// Result of a portfolio-wide auto-renewal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkRenewalReceipt {
    pub message: Option<String>,
    pub renewed_count: Option<u64>,
}

impl BulkRenewalReceipt {
    pub fn from_response(body: &Value) -> Result<Self, WireError> {
        let obj = as_object(body, "bulk renewal")?;
        let renewed_count = present(obj, "renewed_count")
            .map(|v| id_value("renewed_count", v))
            .transpose()?;
        Ok(BulkRenewalReceipt {
            message: optional_string(obj, "message"),
            renewed_count,
        })
    }
}

/// An openable reference to a generated letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRef {
    pub instruction_id: InstructionId,
    pub url: String,
}

impl DocumentRef {
    /// Read the document URL from a view-letter response (`url`,
    /// `signed_url` or `letter_url`).
    pub fn from_response(instruction_id: InstructionId, body: &Value) -> Result<Self, WireError> {
        let obj = as_object(body, "view-letter")?;
        let url = ["url", "signed_url", "letter_url"]
            .iter()
            .find_map(|field| optional_string(obj, field))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| WireError::MissingField {
                field: "url".to_string(),
            })?;
        Ok(DocumentRef {
            instruction_id,
            url,
        })
    }
}
