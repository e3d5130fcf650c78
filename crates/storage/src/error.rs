use lgdesk_interchange::LgId;

use crate::record::ViewScope;

/// All errors that can be returned by a RecordView implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The view holds no copy of the record, so there is nothing to patch.
    #[error("LG {lg_id} is not held by view {scope}")]
    RecordNotFound { lg_id: LgId, scope: ViewScope },

    /// A detail view was asked to absorb a record other than the one it shows.
    #[error("view {scope} cannot hold LG {lg_id}")]
    OutsideScope { lg_id: LgId, scope: ViewScope },
}
