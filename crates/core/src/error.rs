use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::prediction::FilterQuery;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{0}")]
    NotFound(NotFound),

    #[error("missing columns in snapshot: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("failed to read snapshot {}: {detail}", .path.display())]
    Read { path: PathBuf, detail: String },

    #[error("upstream error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone)]
pub enum NotFound {
    Directory(PathBuf),
    NoSnapshot(PathBuf),
    NoMatchingRows(FilterQuery),
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Directory(dir) => write!(f, "directory not found: {}", dir.display()),
            NotFound::NoSnapshot(dir) => {
                write!(f, "no snapshot available in {}", dir.display())
            }
            NotFound::NoMatchingRows(q) => write!(
                f,
                "no data for given combination: Ticker={}, Model={}, Month-Year={}",
                q.ticker, q.model, q.month_year
            ),
        }
    }
}

impl SnapshotError {
    /// Stable short name used in API error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SnapshotError::NotFound(_) => "not_found",
            SnapshotError::Schema { .. } => "schema_error",
            SnapshotError::Read { .. } => "read_error",
            SnapshotError::Upstream(_) => "upstream_error",
        }
    }

    pub fn is_no_matching_rows(&self) -> bool {
        matches!(self, SnapshotError::NotFound(NotFound::NoMatchingRows(_)))
    }

    pub(crate) fn read(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        SnapshotError::Read {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn upstream(err: &anyhow::Error) -> Self {
        SnapshotError::Upstream(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
