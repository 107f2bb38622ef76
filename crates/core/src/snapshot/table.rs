use crate::domain::prediction::{infer_cell, PredictionRecord, REQUIRED_COLUMNS};
use crate::error::{Result, SnapshotError};
use std::path::{Path, PathBuf};

/// A fully loaded snapshot. Never mutated after `load_snapshot` returns.
#[derive(Debug, Clone)]
pub struct SnapshotTable {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<PredictionRecord>,
}

impl SnapshotTable {
    pub fn new(path: PathBuf, columns: Vec<String>, rows: Vec<PredictionRecord>) -> Self {
        Self {
            path,
            columns,
            rows,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every column in the file, including ones beyond the required set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[PredictionRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn missing_columns(headers: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect()
}

/// Parses the file at `path` and checks it carries every required column.
///
/// Every record is parsed before the column check, so an unparseable file is
/// `Read` even when its header is also incomplete.
pub fn load_snapshot(path: &Path) -> Result<SnapshotTable> {
    let mut reader = open(path)?;
    let columns = read_headers(&mut reader, path)?;

    let mut records = Vec::new();
    for (n, record) in reader.records().enumerate() {
        records.push(record.map_err(|e| SnapshotError::read(path, format!("data row {}: {e}", n + 1)))?);
    }

    let missing = missing_columns(&columns);
    if !missing.is_empty() {
        return Err(SnapshotError::Schema { missing });
    }

    let idx: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|col| columns.iter().position(|h| h == col))
        .collect();

    let rows: Vec<PredictionRecord> = records
        .iter()
        .map(|record| {
            let cell = |i: usize| record.get(idx[i]).unwrap_or("");
            PredictionRecord {
                ticker: cell(0).to_string(),
                model: cell(1).to_string(),
                month_year: cell(2).to_string(),
                index: infer_cell(cell(3)),
                actual: infer_cell(cell(4)),
                prediction: infer_cell(cell(5)),
                prob_class_0: infer_cell(cell(6)),
                prob_class_1: infer_cell(cell(7)),
                correct: infer_cell(cell(8)),
            }
        })
        .collect();

    tracing::info!(
        file = %path.display(),
        rows = rows.len(),
        columns = ?columns,
        "snapshot loaded"
    );
    Ok(SnapshotTable::new(path.to_path_buf(), columns, rows))
}

/// Reads the whole file as CSV without keeping it, failing with `Read` on the
/// first malformed record.
pub(crate) fn ensure_parseable(path: &Path) -> Result<()> {
    let mut reader = open(path)?;
    read_headers(&mut reader, path)?;
    let mut record = csv::StringRecord::new();
    let mut n = 0usize;
    loop {
        n += 1;
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => return Err(SnapshotError::read(path, format!("data row {n}: {e}"))),
        }
    }
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| SnapshotError::read(path, e))
}

fn read_headers(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<Vec<String>> {
    let headers = reader
        .headers()
        .map_err(|e| SnapshotError::read(path, format!("header: {e}")))?;
    Ok(headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect())
}
