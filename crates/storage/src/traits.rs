use async_trait::async_trait;
use lgdesk_interchange::{LgId, LgRecord};

use crate::error::StoreError;
use crate::record::{PatchReceipt, RefreshMode, ReloadSummary, ReloadTicket, ViewScope, ViewStatus};

/// The record-collection trait the reconciler writes through.
///
/// A `RecordView` is the client's read/write-through cache of LG records
/// for one screen: the portfolio list, the action center, or a single
/// record's detail page. The authority remains the source of truth; a view
/// only holds the last copy it was given.
///
/// ## Patch Semantics
///
/// `patch` replaces exactly one record, matched by `id`. It never touches
/// any other record, so two actions resolving concurrently against
/// different records cannot disturb each other. Every patch is stamped with
/// a fresh view generation and answered with a [`PatchReceipt`].
///
/// ## Reload Lifecycle
///
/// Full reloads are the only wholesale writes:
///
/// 1. `begin_reload(mode)`: raise the indicator for `mode`, returns a ticket
/// 2. fetch the records from the authority
/// 3. `finish_reload(ticket, records)`: replace the collection
///    OR `abort_reload(ticket, message)`: keep the collection, record the error
///
/// A record patched after the ticket was issued keeps its patched copy when
/// the reload finishes; the reload's copy of that record was read before the
/// patch and is older.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one view can be shared
/// between the executor, reconciler and any background refresh task.
#[async_trait]
pub trait RecordView: Send + Sync + 'static {
    /// The slice of the portfolio this view renders.
    fn scope(&self) -> ViewScope;

    // ── Reads ───────────────────────────────────────────────────────────────

    /// The cached copy of one record.
    async fn get(&self, id: LgId) -> Option<LgRecord>;

    /// Every cached record, in display order.
    async fn records(&self) -> Vec<LgRecord>;

    /// Current loading indicators.
    async fn status(&self) -> ViewStatus;

    // ── Patch-by-identity ───────────────────────────────────────────────────

    /// Replace the cached copy of `record.id` with `record`.
    ///
    /// Returns `Err(StoreError::RecordNotFound)` if the view does not hold the
    /// record, or `Err(StoreError::OutsideScope)` if a detail view is handed a
    /// different record.
    async fn patch(&self, record: LgRecord) -> Result<PatchReceipt, StoreError>;

    // ── Full reload ─────────────────────────────────────────────────────────

    /// Start a full reload and raise the indicator matching `mode`.
    async fn begin_reload(&self, mode: RefreshMode) -> ReloadTicket;

    /// Install the records fetched for `ticket`.
    async fn finish_reload(&self, ticket: ReloadTicket, records: Vec<LgRecord>) -> ReloadSummary;

    /// Give up on `ticket`, keeping the current collection.
    async fn abort_reload(&self, ticket: ReloadTicket, message: String);
}
