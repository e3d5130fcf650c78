//! Typed structs for LG records and instructions as served by the authority.
//!
//! The authority owns these records. Fields the orchestrator does not
//! reason about are carried in `extra` so that a server copy can replace
//! a cached copy without dropping anything.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Server-assigned identifier of an LG record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LgId(pub u64);

/// Server-assigned identifier of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionId(pub u64);

/// Identifier of a maker-checker approval request queued by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalRequestId(pub u64);

impl fmt::Display for LgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApprovalRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase, alphanumeric-only form of a wire enum name.
///
/// `"Non-Operative"`, `"NON_OPERATIVE"` and `"nonOperative"` all fold to
/// `"nonoperative"`.
fn fold_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ──────────────────────────────────────────────
// LgStatus
// ──────────────────────────────────────────────

/// Lifecycle status of an LG record.
///
/// Membership is defined by the authority. The orchestrator reasons about
/// the named variants; any other name is preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LgStatus {
    Valid,
    Active,
    Expired,
    Released,
    Liquidated,
    NonOperative,
    Other(String),
}

impl LgStatus {
    /// Parse a wire status name. Never fails: unknown names become `Other`.
    pub fn from_wire(raw: &str) -> Self {
        match fold_name(raw).as_str() {
            "valid" => LgStatus::Valid,
            "active" => LgStatus::Active,
            "expired" => LgStatus::Expired,
            "released" => LgStatus::Released,
            "liquidated" => LgStatus::Liquidated,
            "nonoperative" => LgStatus::NonOperative,
            _ => LgStatus::Other(raw.to_string()),
        }
    }
}

impl From<String> for LgStatus {
    fn from(raw: String) -> Self {
        LgStatus::from_wire(&raw)
    }
}

impl From<LgStatus> for String {
    fn from(status: LgStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for LgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LgStatus::Valid => write!(f, "Valid"),
            LgStatus::Active => write!(f, "Active"),
            LgStatus::Expired => write!(f, "Expired"),
            LgStatus::Released => write!(f, "Released"),
            LgStatus::Liquidated => write!(f, "Liquidated"),
            LgStatus::NonOperative => write!(f, "Non-Operative"),
            LgStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

// ──────────────────────────────────────────────
// InstructionType
// ──────────────────────────────────────────────

/// Kind of document an instruction represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstructionType {
    Issuance,
    Extension,
    Release,
    Liquidation,
    Reduction,
    OwnerChange,
    AutoRenewal,
    Reminder,
    Other(String),
}

impl InstructionType {
    pub fn from_wire(raw: &str) -> Self {
        let folded = fold_name(raw);
        let folded = folded.strip_prefix("lg").unwrap_or(&folded);
        match folded {
            "issuance" | "issue" => InstructionType::Issuance,
            "extension" | "extend" => InstructionType::Extension,
            "release" => InstructionType::Release,
            "liquidation" | "liquidate" | "fullliquidation" | "partialliquidation" => {
                InstructionType::Liquidation
            }
            "reduction" | "decreaseamount" | "amountdecrease" => InstructionType::Reduction,
            "ownerchange" | "changeowner" => InstructionType::OwnerChange,
            "autorenewal" | "toggleautorenewal" => InstructionType::AutoRenewal,
            "reminder" | "remindertobank" | "bankreminder" => InstructionType::Reminder,
            _ => InstructionType::Other(raw.to_string()),
        }
    }
}

impl From<String> for InstructionType {
    fn from(raw: String) -> Self {
        InstructionType::from_wire(&raw)
    }
}

impl From<InstructionType> for String {
    fn from(kind: InstructionType) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionType::Issuance => write!(f, "issuance"),
            InstructionType::Extension => write!(f, "extension"),
            InstructionType::Release => write!(f, "release"),
            InstructionType::Liquidation => write!(f, "liquidation"),
            InstructionType::Reduction => write!(f, "reduction"),
            InstructionType::OwnerChange => write!(f, "owner_change"),
            InstructionType::AutoRenewal => write!(f, "auto_renewal"),
            InstructionType::Reminder => write!(f, "reminder"),
            InstructionType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// Contact details of the internal owner responsible for an LG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A generated, dated directive tied to one LG action.
///
/// Never edited locally. Delivery and bank-reply dates change only through
/// their dedicated remote calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgInstruction {
    pub id: InstructionId,
    pub serial_number: String,
    #[serde(alias = "type")]
    pub instruction_type: InstructionType,
    pub instruction_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub delivery_date: Option<Date>,
    #[serde(default)]
    pub bank_reply_date: Option<Date>,
}

impl LgInstruction {
    pub fn is_delivered(&self) -> bool {
        self.delivery_date.is_some()
    }

    pub fn has_bank_reply(&self) -> bool {
        self.bank_reply_date.is_some()
    }
}

/// An LG record as last served by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LgRecord {
    pub id: LgId,
    pub status: LgStatus,
    pub amount: Decimal,
    pub currency: String,
    pub expiry_date: Date,
    #[serde(default)]
    pub auto_renewal: bool,
    pub owner_contact: OwnerContact,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub instructions: Vec<LgInstruction>,
    /// Server fields the orchestrator passes through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LgRecord {
    /// The instruction with the greatest `(created_at, id)`.
    ///
    /// Unique whenever `instructions` is non-empty because instruction ids
    /// are unique.
    pub fn latest_instruction(&self) -> Option<&LgInstruction> {
        self.instructions
            .iter()
            .max_by_key(|instruction| (instruction.created_at, instruction.id))
    }

    pub fn instruction(&self, id: InstructionId) -> Option<&LgInstruction> {
        self.instructions.iter().find(|i| i.id == id)
    }
}

// ──────────────────────────────────────────────
// Subscription
// ──────────────────────────────────────────────

/// Standing of the customer's subscription, computed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Grace,
    Expired,
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_name(s).as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "grace" | "graceperiod" => Ok(SubscriptionStatus::Grace),
            "expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(format!(
                "unknown subscription status '{}' (expected active, grace or expired)",
                s
            )),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Grace => write!(f, "grace"),
            SubscriptionStatus::Expired => write!(f, "expired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json() -> serde_json::Value {
        json!({
            "id": 42,
            "status": "VALID",
            "amount": "150000.00",
            "currency": "EGP",
            "expiry_date": "2025-03-01",
            "auto_renewal": true,
            "owner_contact": {"name": "Mona Adel", "email": "mona@example.com"},
            "beneficiary_name": "Ministry of Works",
            "instructions": [
                {
                    "id": 7,
                    "serial_number": "EXT-0007",
                    "instruction_type": "extension",
                    "instruction_date": "2024-11-02",
                    "created_at": "2024-11-02T09:15:00Z"
                },
                {
                    "id": 9,
                    "serial_number": "ISS-0009",
                    "type": "LG_ISSUANCE",
                    "instruction_date": "2024-11-02",
                    "created_at": "2024-11-02T09:15:00Z",
                    "delivery_date": "2024-11-03"
                },
                {
                    "id": 8,
                    "serial_number": "REL-0008",
                    "instruction_type": "release",
                    "instruction_date": "2024-10-01",
                    "created_at": "2024-10-01T08:00:00Z"
                }
            ]
        })
    }

    #[test]
    fn status_parsing_is_case_and_separator_insensitive() {
        assert_eq!(LgStatus::from_wire("Valid"), LgStatus::Valid);
        assert_eq!(LgStatus::from_wire("NON_OPERATIVE"), LgStatus::NonOperative);
        assert_eq!(LgStatus::from_wire("Non-Operative"), LgStatus::NonOperative);
        assert_eq!(
            LgStatus::from_wire("Suspended"),
            LgStatus::Other("Suspended".to_string())
        );
    }

    #[test]
    fn record_deserializes_and_keeps_unknown_fields() {
        let record: LgRecord = serde_json::from_value(record_json()).unwrap();
        assert_eq!(record.id, LgId(42));
        assert_eq!(record.status, LgStatus::Valid);
        assert_eq!(record.amount, Decimal::new(15_000_000, 2));
        assert!(record.auto_renewal);
        assert!(!record.is_deleted);
        assert_eq!(
            record.extra.get("beneficiary_name"),
            Some(&json!("Ministry of Works"))
        );
        assert_eq!(
            record.instructions[1].instruction_type,
            InstructionType::Issuance
        );
        assert!(record.instructions[1].is_delivered());
    }

    #[test]
    fn latest_instruction_breaks_timestamp_ties_by_id() {
        let record: LgRecord = serde_json::from_value(record_json()).unwrap();
        let latest = record.latest_instruction().unwrap();
        assert_eq!(latest.id, InstructionId(9));
    }

    #[test]
    fn latest_instruction_is_none_without_instructions() {
        let mut value = record_json();
        value["instructions"] = json!([]);
        let record: LgRecord = serde_json::from_value(value).unwrap();
        assert!(record.latest_instruction().is_none());
    }

    #[test]
    fn numeric_amount_is_accepted() {
        let mut value = record_json();
        value["amount"] = json!(2500);
        let record: LgRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.amount, Decimal::from(2500));
    }

    #[test]
    fn subscription_status_from_str() {
        assert_eq!(
            "grace".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Grace)
        );
        assert_eq!(
            "Grace_Period".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Grace)
        );
        assert!("trial".parse::<SubscriptionStatus>().is_err());
    }
}
