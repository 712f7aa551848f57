//! Snapshot model and diff engine.
//!
//! A [`DirectorySnapshot`] is an immutable listing of the regular files under
//! one watched root. Two snapshots of the same root are compared either for
//! stability ([`DirectorySnapshot::filtered_eq`]) or for change
//! classification ([`diff`]), both through a [`MatchPredicate`](crate::filter::MatchPredicate)
//! applied to each record.

mod change;
mod diff;
mod directory;
mod error;
mod record;
mod state;

pub use change::{ChangeBatch, ChangeKind, ChangeRecord};
pub use diff::diff;
pub use directory::DirectorySnapshot;
pub use error::{SnapshotError, SnapshotResult};
pub use record::FileRecord;
pub use state::WatchState;

pub(crate) use directory::now_millis;
