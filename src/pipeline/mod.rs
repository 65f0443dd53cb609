//! Pipeline entry points for sync operations.
//!
//! - `detect_changes`: Partition a listing into new, changed and unchanged
//! - `ListingGuard`: Reject a listing that collapsed against the store
//! - `SyncEngine`: Run one poll → diff → fetch → store cycle

pub mod diff;
pub mod guard;
pub mod sync;

pub use diff::{ChangeSet, detect_changes};
pub use guard::{GuardVerdict, ListingGuard};
pub use sync::{SyncEngine, SyncReport};
