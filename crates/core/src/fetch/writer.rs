use crate::fetch::Document;
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Union of document keys, in first-seen order.
pub fn snapshot_columns(documents: &[Document]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for doc in documents {
        for key in doc.keys() {
            if !out.iter().any(|k| k == key) {
                out.push(key.clone());
            }
        }
    }
    out
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Writes `documents` as CSV at `path`.
///
/// Rows go to a hidden `.partial` sibling first and are published into place
/// only when complete, so the locator never sees a half-written snapshot.
pub fn write_snapshot(documents: &[Document], path: &Path) -> anyhow::Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;

    anyhow::ensure!(!path.exists(), "snapshot {} already exists", path.display());

    let file_name = path
        .file_name()
        .context("snapshot path has no file name")?
        .to_string_lossy();
    let tmp = dir.join(format!(".{file_name}.partial"));

    let res = write_rows(documents, &tmp).and_then(|()| publish(&tmp, path));
    let _ = std::fs::remove_file(&tmp);
    res?;

    Ok(path.to_path_buf())
}

/// Links the finished file at `path`. Unlike `rename`, linking fails when
/// `path` already exists, so a snapshot is never replaced. The caller removes
/// `tmp` afterwards.
fn publish(tmp: &Path, path: &Path) -> anyhow::Result<()> {
    std::fs::hard_link(tmp, path).with_context(|| {
        format!("failed to publish snapshot at {} (it may already exist)", path.display())
    })
}

fn write_rows(documents: &[Document], tmp: &Path) -> anyhow::Result<()> {
    let columns = snapshot_columns(documents);
    let mut wtr = csv::Writer::from_path(tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))?;

    wtr.write_record(&columns).context("write snapshot header failed")?;
    for doc in documents {
        wtr.write_record(columns.iter().map(|c| cell_text(doc.get(c))))
            .context("write snapshot row failed")?;
    }
    wtr.flush().context("flush snapshot failed")?;
    Ok(())
}
