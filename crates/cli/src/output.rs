//! Rendering for the terminal: records, catalogs, notices and invocations.

use std::collections::BTreeSet;

use async_trait::async_trait;
use lgdesk_interchange::{DocumentRef, LgInstruction, LgRecord, LgStatus};
use lgdesk_orchestrator::{
    ActionKind, Invocation, LetterPresenter, Notice, NoticeLevel, Notifier, PresentError,
};
use serde::Serialize;

use crate::OutputFormat;

/// The subcommand that runs an action.
pub(crate) fn command_name(action: ActionKind) -> &'static str {
    match action {
        ActionKind::Extend => "extend",
        ActionKind::Release => "release",
        ActionKind::Liquidate => "liquidate",
        ActionKind::DecreaseAmount => "decrease-amount",
        ActionKind::ChangeOwner => "change-owner",
        ActionKind::ToggleAutoRenewal => "toggle-auto-renewal",
        ActionKind::RecordDelivery => "record-delivery",
        ActionKind::RecordBankReply => "record-bank-reply",
        ActionKind::SendReminder => "send-reminder",
        ActionKind::RunBulkRenewal => "bulk-renewal",
    }
}

fn command_list(actions: &BTreeSet<ActionKind>) -> String {
    if actions.is_empty() {
        return "-".to_string();
    }
    actions
        .iter()
        .map(|a| command_name(*a))
        .collect::<Vec<_>>()
        .join(", ")
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{{\"error\": \"could not serialize output: {}\"}}", e),
    }
}

// ── Records ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct RecordEntry<'a> {
    pub record: &'a LgRecord,
    pub actions: &'a BTreeSet<ActionKind>,
}

pub(crate) fn print_records(entries: &[(LgRecord, BTreeSet<ActionKind>)], output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let rows: Vec<RecordEntry<'_>> = entries
                .iter()
                .map(|(record, actions)| RecordEntry { record, actions })
                .collect();
            print_json(&rows);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No LG records.");
                return;
            }
            for (record, actions) in entries {
                println!(
                    "#{:<6} {:<14} {} {:>14}  expires {}  auto-renewal {:<3}  actions: {}",
                    record.id.to_string(),
                    record.status.to_string(),
                    record.currency,
                    record.amount.to_string(),
                    record.expiry_date,
                    on_off(record.auto_renewal),
                    command_list(actions)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct InstructionEntry<'a> {
    instruction: &'a LgInstruction,
    actions: &'a BTreeSet<ActionKind>,
}

#[derive(Serialize)]
struct RecordDetail<'a> {
    record: &'a LgRecord,
    actions: &'a BTreeSet<ActionKind>,
    instructions: Vec<InstructionEntry<'a>>,
}

pub(crate) fn print_record_detail(
    record: &LgRecord,
    actions: &BTreeSet<ActionKind>,
    instructions: &[(LgInstruction, BTreeSet<ActionKind>)],
    output: OutputFormat,
) {
    match output {
        OutputFormat::Json => print_json(&RecordDetail {
            record,
            actions,
            instructions: instructions
                .iter()
                .map(|(instruction, actions)| InstructionEntry {
                    instruction,
                    actions,
                })
                .collect(),
        }),
        OutputFormat::Text => {
            println!("LG #{}", record.id);
            println!("  status:       {}", record.status);
            println!("  amount:       {} {}", record.currency, record.amount);
            println!("  expiry:       {}", record.expiry_date);
            println!("  auto-renewal: {}", on_off(record.auto_renewal));
            println!(
                "  owner:        {} <{}>",
                record.owner_contact.name, record.owner_contact.email
            );
            if let Some(phone) = &record.owner_contact.phone {
                println!("  phone:        {}", phone);
            }
            println!("  actions:      {}", command_list(actions));
            if instructions.is_empty() {
                return;
            }
            println!("  instructions:");
            for (instruction, actions) in instructions {
                let delivered = instruction
                    .delivery_date
                    .map(|d| format!("delivered {}", d))
                    .unwrap_or_else(|| "not delivered".to_string());
                let replied = instruction
                    .bank_reply_date
                    .map(|d| format!(", bank replied {}", d))
                    .unwrap_or_default();
                println!(
                    "    #{} {} {} dated {} ({}{})  actions: {}",
                    instruction.id,
                    instruction.serial_number,
                    instruction.instruction_type,
                    instruction.instruction_date,
                    delivered,
                    replied,
                    command_list(actions)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct CatalogEntry<'a> {
    status: String,
    actions: &'a BTreeSet<ActionKind>,
}

pub(crate) fn print_catalog(status: &LgStatus, actions: &BTreeSet<ActionKind>, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&CatalogEntry {
            status: status.to_string(),
            actions,
        }),
        OutputFormat::Text => {
            println!("{}:", status);
            if actions.is_empty() {
                println!("  (no actions)");
            }
            for action in actions {
                println!("  {:<20} {}", command_name(*action), action);
            }
        }
    }
}

// ── Invocations ─────────────────────────────────────────────────────────────

/// Text mode already streamed the notices; JSON mode prints the whole report.
pub(crate) fn print_invocation(invocation: &Invocation, output: OutputFormat) {
    if output == OutputFormat::Json {
        print_json(invocation);
    }
}

/// Prints notices as they are raised. Silent in JSON mode and with `--quiet`.
pub(crate) struct ConsoleNotifier {
    output: OutputFormat,
    quiet: bool,
}

impl ConsoleNotifier {
    pub(crate) fn new(output: OutputFormat, quiet: bool) -> Self {
        ConsoleNotifier { output, quiet }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        if self.quiet || self.output == OutputFormat::Json {
            return;
        }
        match notice.level {
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", notice),
            NoticeLevel::Warning | NoticeLevel::Error => eprintln!("{}", notice),
        }
    }
}

/// "Opens" a letter by printing its URL.
pub(crate) struct ConsolePresenter {
    output: OutputFormat,
    quiet: bool,
}

impl ConsolePresenter {
    pub(crate) fn new(output: OutputFormat, quiet: bool) -> Self {
        ConsolePresenter { output, quiet }
    }
}

#[async_trait]
impl LetterPresenter for ConsolePresenter {
    async fn present(&self, document: &DocumentRef) -> Result<(), PresentError> {
        if !self.quiet && self.output == OutputFormat::Text {
            println!("Letter for instruction #{}: {}", document.instruction_id, document.url);
        }
        Ok(())
    }
}
