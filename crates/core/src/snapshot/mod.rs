pub mod locator;
pub mod table;

pub use locator::{list_snapshots, load_latest, locate_latest, SnapshotCandidate, SNAPSHOT_PATTERN};
pub use table::{load_snapshot, SnapshotTable};
