//! Action executor: gate, catalog, validation, one remote call, one parse.
//!
//! The executor never touches a view. It is handed the cached target,
//! re-checks everything the caller should already have checked, sends the
//! request, and turns the answer into a typed result. No mutation is ever
//! retried.

use std::sync::Arc;

use lgdesk_interchange::{
    parse_record, parse_record_list, remote_error_field, remote_error_message, ActionOutcome,
    BulkRenewalReceipt, DeliveryAck, DocumentRef, InstructionId, LgId, LgRecord, ReminderReceipt,
};
use serde::Serialize;
use serde_json::Value;

use crate::authority::{paths, Authority, RemoteRequest};
use crate::catalog::{ensure_instruction_action, ensure_record_action, ActionKind};
use crate::error::ActionError;
use crate::gate::Gate;
use crate::payload::{build_request, validate, ActionPayload, ActionRequest, ActionTarget};

/// Result of an instruction-level action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstructionOutcome {
    /// Delivery or bank reply recorded.
    Recorded(DeliveryAck),
    /// Reminder sent; may have generated a reminder letter.
    Reminded(ReminderReceipt),
}

impl InstructionOutcome {
    pub fn message(&self) -> Option<&str> {
        match self {
            InstructionOutcome::Recorded(ack) => ack.message.as_deref(),
            InstructionOutcome::Reminded(receipt) => Some(receipt.message.as_str()),
        }
    }

    /// The generated letter to open, if any.
    pub fn letter_to_open(&self) -> Option<InstructionId> {
        match self {
            InstructionOutcome::Recorded(_) => None,
            InstructionOutcome::Reminded(receipt) => receipt.new_instruction_id,
        }
    }
}

/// Executes actions against one authority under one gate.
#[derive(Clone)]
pub struct Executor {
    authority: Arc<dyn Authority>,
    gate: Gate,
}

impl Executor {
    pub fn new(authority: Arc<dyn Authority>, gate: Gate) -> Self {
        Executor { authority, gate }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Run a record-level action against the cached `target`.
    pub async fn execute(
        &self,
        request: &ActionRequest,
        target: &LgRecord,
    ) -> Result<ActionOutcome, ActionError> {
        let action = request.kind();
        self.gate.check(action)?;

        match request.target() {
            ActionTarget::Record(id) if id == target.id => {}
            other => {
                return Err(ActionError::TargetMismatch {
                    action,
                    target: other.to_string(),
                })
            }
        }
        ensure_record_action(action, target)?;
        validate(request.payload(), Some(target), None)?;

        let body = self.send(action, build_request(request)).await?;
        let outcome = ActionOutcome::from_response(&body)?;

        // Applied copies and provisional snapshots are patched by id.
        if let Some(returned) = outcome.record() {
            if returned.id != target.id {
                tracing::error!(%action, lg_id = %target.id, returned = %returned.id, "response names another record");
                return Err(ActionError::MalformedResponse {
                    message: format!(
                        "response for LG {} carries LG {}",
                        target.id, returned.id
                    ),
                });
            }
        }

        if action == ActionKind::ToggleAutoRenewal && outcome.is_pending() {
            return Err(ActionError::MalformedResponse {
                message: "auto-renewal toggles are applied directly, not queued for approval"
                    .to_string(),
            });
        }

        match &outcome {
            ActionOutcome::Applied {
                record,
                latest_instruction_id,
                ..
            } => tracing::info!(
                %action,
                lg_id = %record.id,
                latest_instruction_id = ?latest_instruction_id.map(|i| i.0),
                "action applied"
            ),
            ActionOutcome::Pending {
                approval_request_id,
                ..
            } => tracing::info!(
                %action,
                lg_id = %target.id,
                approval_request_id = %approval_request_id,
                "action queued for approval"
            ),
        }
        Ok(outcome)
    }

    /// Run an instruction-level action against an instruction of `record`.
    pub async fn execute_instruction(
        &self,
        request: &ActionRequest,
        record: &LgRecord,
    ) -> Result<InstructionOutcome, ActionError> {
        let action = request.kind();
        self.gate.check(action)?;

        let instruction_id = match request.target() {
            ActionTarget::Instruction {
                lg_id,
                instruction_id,
            } if lg_id == record.id => instruction_id,
            other => {
                return Err(ActionError::TargetMismatch {
                    action,
                    target: other.to_string(),
                })
            }
        };
        let instruction =
            record
                .instruction(instruction_id)
                .ok_or(ActionError::UnknownInstruction {
                    lg_id: record.id,
                    instruction_id,
                })?;
        ensure_instruction_action(action, record, instruction)?;
        validate(request.payload(), Some(record), Some(instruction))?;

        let body = self.send(action, build_request(request)).await?;

        let outcome = match request.payload() {
            ActionPayload::SendReminder => {
                InstructionOutcome::Reminded(ReminderReceipt::from_response(&body)?)
            }
            _ => {
                let ack = DeliveryAck::from_response(&body)?;
                if !ack.success {
                    return Err(ActionError::Remote {
                        status: 200,
                        message: ack
                            .message
                            .unwrap_or_else(|| format!("{} was not accepted", action)),
                    });
                }
                InstructionOutcome::Recorded(ack)
            }
        };
        tracing::info!(%action, lg_id = %record.id, %instruction_id, "instruction action applied");
        Ok(outcome)
    }

    /// Trigger the authority's auto-renewal run for the whole portfolio.
    pub async fn run_bulk_renewal(&self) -> Result<BulkRenewalReceipt, ActionError> {
        let action = ActionKind::RunBulkRenewal;
        self.gate.check(action)?;
        let body = self
            .send(action, build_request(&ActionRequest::bulk_renewal()))
            .await?;
        let receipt = BulkRenewalReceipt::from_response(&body)?;
        tracing::info!(renewed_count = ?receipt.renewed_count, "bulk renewal completed");
        Ok(receipt)
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// `GET /lg-records/` for a full reload.
    pub async fn fetch_records(&self) -> Result<Vec<LgRecord>, ActionError> {
        let body = self.read(RemoteRequest::get(paths::RECORDS.to_string())).await?;
        Ok(parse_record_list(&body)?)
    }

    /// `GET /lg-records/{id}` for a single-record refresh.
    pub async fn fetch_record(&self, id: LgId) -> Result<LgRecord, ActionError> {
        let body = self.read(RemoteRequest::get(paths::record(id))).await?;
        let record = parse_record(&body)?;
        if record.id != id {
            return Err(ActionError::MalformedResponse {
                message: format!("request for LG {} returned LG {}", id, record.id),
            });
        }
        Ok(record)
    }

    /// Flag the instruction's letter as accessed for print.
    pub async fn mark_accessed_for_print(&self, id: InstructionId) -> Result<(), ActionError> {
        self.read(RemoteRequest::post_empty(paths::mark_accessed_for_print(id)))
            .await
            .map(|_| ())
    }

    /// Obtain an openable reference to the instruction's letter.
    pub async fn view_letter(&self, id: InstructionId) -> Result<DocumentRef, ActionError> {
        let body = self.read(RemoteRequest::get(paths::view_letter(id))).await?;
        Ok(DocumentRef::from_response(id, &body)?)
    }

    // ── Exchange ────────────────────────────────────────────────────────────

    async fn send(&self, action: ActionKind, request: RemoteRequest) -> Result<Value, ActionError> {
        self.exchange(&action.to_string(), request).await
    }

    async fn read(&self, request: RemoteRequest) -> Result<Value, ActionError> {
        let label = format!("{} {}", request.method, request.path);
        self.exchange(&label, request).await
    }

    /// One request, one answer. Non-2xx answers become errors carrying the
    /// authority's own message.
    async fn exchange(&self, label: &str, request: RemoteRequest) -> Result<Value, ActionError> {
        let response = self.authority.send(request).await.map_err(|e| {
            tracing::error!(request = label, kind = "network", error = %e, "authority unreachable");
            ActionError::Network {
                message: e.to_string(),
            }
        })?;

        if response.is_success() {
            return Ok(response.body);
        }

        let status = response.status;
        let message = remote_error_message(&response.body)
            .unwrap_or_else(|| format!("Request failed with status {}", status));
        tracing::error!(request = label, kind = "remote", status, %message, "authority refused request");

        if status == 422 {
            return Err(ActionError::Validation {
                field: remote_error_field(&response.body),
                message,
            });
        }
        Err(ActionError::Remote { status, message })
    }
}
