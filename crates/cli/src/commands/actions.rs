//! Mutating commands. Each one runs a single invocation through the desk.

use std::path::Path;
use std::process;
use std::sync::Arc;

use lgdesk_interchange::{InstructionId, LgId};
use lgdesk_orchestrator::{ActionPayload, ActionRequest, Attachment, Invocation};
use lgdesk_storage::{DetailView, ListView};

use super::{Globals, Session};
use crate::fail;
use crate::output;

/// Read `--document`. Size and emptiness are checked with the rest of the payload.
pub(crate) fn read_document(path: Option<&Path>, globals: &Globals) -> Option<Attachment> {
    let path = path?;
    match Attachment::from_path(path) {
        Ok(attachment) => Some(attachment),
        Err(e) => fail(&format!("could not read '{}': {}", path.display(), e), globals),
    }
}

pub(crate) fn cmd_record_action(id: LgId, payload: ActionPayload, globals: &Globals) {
    let request = match ActionRequest::record(id, payload) {
        Ok(r) => r,
        Err(e) => fail(&e.user_message(), globals),
    };
    let session = Session::open(globals, Arc::new(DetailView::new(id)));
    // A gated desk refuses before anything is fetched.
    if session.desk.gate().allows_mutation() {
        session.load(globals);
    }
    let invocation = session.block_on(session.desk.invoke(request));
    finish(&invocation, globals);
}

pub(crate) fn cmd_instruction_action(
    lg_id: LgId,
    instruction_id: InstructionId,
    payload: ActionPayload,
    globals: &Globals,
) {
    let request = match ActionRequest::instruction(lg_id, instruction_id, payload) {
        Ok(r) => r,
        Err(e) => fail(&e.user_message(), globals),
    };
    let session = Session::open(globals, Arc::new(DetailView::new(lg_id)));
    if session.desk.gate().allows_mutation() {
        session.load(globals);
    }
    let invocation = session.block_on(session.desk.invoke(request));
    finish(&invocation, globals);
}

pub(crate) fn cmd_bulk_renewal(globals: &Globals) {
    let session = Session::open(globals, Arc::new(ListView::new("portfolio")));
    let invocation = session.block_on(session.desk.invoke(ActionRequest::bulk_renewal()));
    finish(&invocation, globals);
}

fn finish(invocation: &Invocation, globals: &Globals) {
    output::print_invocation(invocation, globals.output);
    if !invocation.status.succeeded() {
        process::exit(1);
    }
}
