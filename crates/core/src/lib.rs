//! `paygrid-core` — grid session, row store, and sync protocol for the
//! accounts-payable ledger.
//!
//! Pure state-machine crate: all remote traffic goes through the
//! [`store::RecordStore`] trait, so this crate carries no HTTP
//! dependency and tests run against an in-memory store.

pub mod column;
pub mod dates;
pub mod entry;
pub mod grid;
pub mod ledger;
pub mod row;
pub mod store;
pub mod sync;

#[cfg(test)]
pub mod harness;

pub use column::Column;
pub use entry::{EntryHeader, EntryStatus, Vendor};
pub use grid::{Direction, GridSession, Selection};
pub use ledger::{Ledger, TotalSource};
pub use row::{LocalId, Row, RowStatus};
pub use store::{FieldData, RecordStore, RecordWithId, StoreError, UpdateOptions};
pub use sync::{SyncOptions, SyncReport};
