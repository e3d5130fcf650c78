use std::fmt;

use lgdesk_interchange::{InstructionId, LgId};
use serde::Serialize;

/// Which slice of the portfolio a view renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ViewScope {
    /// A named list (`"portfolio"`, `"action-center"`, ...).
    List(String),
    /// The detail page of a single record.
    Detail(LgId),
}

impl fmt::Display for ViewScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewScope::List(name) => write!(f, "list:{}", name),
            ViewScope::Detail(id) => write!(f, "detail:{}", id),
        }
    }
}

/// How a full reload presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshMode {
    /// First load: the blocking loading indicator is shown.
    Initial,
    /// Reload that keeps scroll position and focus: only the subtle
    /// refreshing indicator is shown.
    Background,
}

/// Loading indicators a view exposes to its renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewStatus {
    pub loading: bool,
    pub refreshing: bool,
    /// Message of the most recent failed reload, cleared by the next success.
    pub last_error: Option<String>,
}

/// Proof that a record patch has been committed to a view.
///
/// Only a view can mint one. Side effects that must observe the committed
/// state take a receipt by value, which orders them after the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReceipt {
    scope: ViewScope,
    lg_id: LgId,
    generation: u64,
    latest_instruction_id: Option<InstructionId>,
}

impl PatchReceipt {
    pub(crate) fn new(
        scope: ViewScope,
        lg_id: LgId,
        generation: u64,
        latest_instruction_id: Option<InstructionId>,
    ) -> Self {
        PatchReceipt {
            scope,
            lg_id,
            generation,
            latest_instruction_id,
        }
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn lg_id(&self) -> LgId {
        self.lg_id
    }

    /// View generation assigned to this patch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest instruction of the record as committed.
    pub fn latest_instruction_id(&self) -> Option<InstructionId> {
        self.latest_instruction_id
    }
}

/// An in-progress full reload, returned by `RecordView::begin_reload`.
#[derive(Debug)]
pub struct ReloadTicket {
    pub(crate) mode: RefreshMode,
    pub(crate) started_at_generation: u64,
}

/// What a finished reload did to the view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Records now held by the view.
    pub total: usize,
    /// Records whose newer local patch survived the reload.
    pub preserved_patches: Vec<LgId>,
}
