mod error;
mod record;
mod traits;
mod view;

pub use error::StoreError;
pub use record::{PatchReceipt, RefreshMode, ReloadSummary, ReloadTicket, ViewScope, ViewStatus};
pub use traits::RecordView;
pub use view::{DetailView, ListView};
