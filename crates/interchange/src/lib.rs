//! lgdesk-interchange: wire types shared by every lgdesk crate.
//!
//! Provides typed structs for the records the LG authority serves
//! (`LgRecord`, `LgInstruction`) and the response shapes returned by
//! its mutating endpoints. Raw JSON is inspected exactly once, here;
//! everything downstream works on the tagged results ([`ActionOutcome`]
//! and friends) and never re-reads response fields.

pub mod deserialize;
pub mod outcome;
pub mod types;

pub use deserialize::{
    parse_record, parse_record_list, remote_error_field, remote_error_message, WireError,
};
pub use outcome::{ActionOutcome, BulkRenewalReceipt, DeliveryAck, DocumentRef, ReminderReceipt};
pub use types::*;
