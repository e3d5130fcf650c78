//! Read-only commands: `list`, `show` and `catalog`.

use std::collections::BTreeSet;
use std::sync::Arc;

use lgdesk_interchange::{LgId, LgStatus};
use lgdesk_orchestrator::{available_actions, ActionKind};
use lgdesk_storage::{DetailView, ListView, RecordView};

use super::{Globals, Session};
use crate::fail;
use crate::output;

pub(crate) fn cmd_list(globals: &Globals) {
    let view: Arc<dyn RecordView> = Arc::new(ListView::new("portfolio"));
    let session = Session::open(globals, view.clone());
    session.load(globals);

    let entries = session.block_on(async {
        let mut entries = Vec::new();
        for record in view.records().await {
            let actions = session.desk.record_actions(record.id).await;
            entries.push((record, actions));
        }
        entries
    });
    output::print_records(&entries, globals.output);
}

pub(crate) fn cmd_show(id: LgId, globals: &Globals) {
    let view = Arc::new(DetailView::new(id));
    let session = Session::open(globals, view.clone());
    session.load(globals);

    let Some(record) = session.block_on(view.record()) else {
        fail(&format!("LG #{} was not found", id), globals);
    };
    let (actions, instructions) = session.block_on(async {
        let actions = session.desk.record_actions(id).await;
        let mut instructions = Vec::new();
        for instruction in &record.instructions {
            let offered = session.desk.instruction_actions(id, instruction.id).await;
            instructions.push((instruction.clone(), offered));
        }
        (actions, instructions)
    });
    output::print_record_detail(&record, &actions, &instructions, globals.output);
}

/// Offline: what the catalog offers for a status, before any per-record check.
pub(crate) fn cmd_catalog(status: &str, globals: &Globals) {
    let status = LgStatus::from_wire(status);
    let actions: BTreeSet<ActionKind> = available_actions(&status);
    output::print_catalog(&status, &actions, globals.output);
}
