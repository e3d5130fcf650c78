//! LG action orchestration: decides which mutations are allowed, runs them
//! against the authority, reconciles the local views, and opens generated
//! letters once the state that produced them is committed.
//!
//! Leaf first: [`gate`] → [`catalog`] → [`executor`] → [`reconcile`] →
//! [`sequencer`]. [`desk::ActionDesk`] wires them for one view and is the
//! boundary where every error becomes a notice.

pub mod authority;
pub mod catalog;
pub mod desk;
pub mod error;
pub mod executor;
pub mod gate;
pub mod latch;
pub mod notify;
pub mod payload;
pub mod reconcile;
pub mod sequencer;
pub mod settings;

pub use authority::http::HttpAuthority;
pub use authority::scripted::{Reply, ScriptedAuthority};
pub use authority::{Attachment, Authority, Method, RemoteRequest, RemoteResponse, TransportError};
pub use catalog::{
    available_actions, instruction_actions, record_actions, ActionKind, ActionScope,
    Reconciliation,
};
pub use desk::{ActionDesk, Invocation, InvocationStatus};
pub use error::{ActionError, SideEffectError, GENERIC_FAILURE};
pub use executor::{Executor, InstructionOutcome};
pub use gate::{can_mutate, Gate, SubscriptionCell, SubscriptionSource};
pub use latch::{SubmissionGuard, SubmissionLatch};
pub use notify::{CollectingNotifier, Notice, NoticeLevel, Notifier};
pub use payload::{ActionPayload, ActionRequest, ActionTarget, LiquidationKind};
pub use reconcile::{BulkReconciled, InstructionReconciled, Reconciled, Reconciler};
pub use sequencer::{CollectingPresenter, CommittedLetter, LetterPresenter, PresentError, Sequencer};
pub use settings::{AuthoritySettings, DeskSettings, Settings};
