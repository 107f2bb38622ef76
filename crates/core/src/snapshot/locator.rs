use crate::error::{NotFound, Result, SnapshotError};
use crate::snapshot::table::{self, SnapshotTable};
use globwalk::{FileType, GlobWalkerBuilder};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File name pattern written by the fetch job.
pub const SNAPSHOT_PATTERN: &str = "mongodb_data_*.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCandidate {
    pub path: PathBuf,
    pub created: SystemTime,
}

/// Lists files directly inside `dir` whose name matches `pattern`.
///
/// Creation time falls back to modification time on filesystems that do not
/// report a birth time.
pub fn list_snapshots(dir: &Path, pattern: &str) -> Result<Vec<SnapshotCandidate>> {
    if !dir.is_dir() {
        return Err(SnapshotError::NotFound(NotFound::Directory(dir.to_path_buf())));
    }

    let walker = GlobWalkerBuilder::from_patterns(dir, &[pattern])
        .max_depth(1)
        .file_type(FileType::FILE)
        .build()
        .map_err(|e| SnapshotError::read(dir, format!("invalid snapshot pattern {pattern}: {e}")))?;

    let mut out = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| SnapshotError::read(dir, e))?;
        let path = entry.path().to_path_buf();
        let meta = entry.metadata().map_err(|e| SnapshotError::read(&path, e))?;
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|e| SnapshotError::read(&path, e))?;
        out.push(SnapshotCandidate { path, created });
    }
    Ok(out)
}

/// Latest creation time wins; equal timestamps fall back to the greatest file name.
pub fn select_latest(candidates: &[SnapshotCandidate]) -> Option<&SnapshotCandidate> {
    candidates.iter().max_by(|a, b| {
        a.created
            .cmp(&b.created)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    })
}

fn latest_path(dir: &Path, pattern: &str) -> Result<PathBuf> {
    let candidates = list_snapshots(dir, pattern)?;
    tracing::info!(
        dir = %dir.display(),
        found = candidates.len(),
        "scanned snapshot directory"
    );

    let latest = select_latest(&candidates)
        .ok_or_else(|| SnapshotError::NotFound(NotFound::NoSnapshot(dir.to_path_buf())))?;
    tracing::info!(file = %latest.path.display(), "latest snapshot selected");
    Ok(latest.path.clone())
}

/// Re-scans `dir` on every call and returns the newest snapshot, after checking
/// that it parses as CSV.
pub fn locate_latest(dir: &Path, pattern: &str) -> Result<PathBuf> {
    let path = latest_path(dir, pattern)?;
    table::ensure_parseable(&path)?;
    Ok(path)
}

/// `locate_latest` followed by `load_snapshot`, parsing the file once.
///
/// `load_snapshot` reports malformed records as `Read` before it checks
/// columns, so errors match the two-step path.
pub fn load_latest(dir: &Path, pattern: &str) -> Result<SnapshotTable> {
    let path = latest_path(dir, pattern)?;
    table::load_snapshot(&path)
}
