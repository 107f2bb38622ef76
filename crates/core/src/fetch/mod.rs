pub mod mongo;
pub mod writer;

pub use mongo::MongoSource;

use crate::config::Settings;
use crate::error::SnapshotError;
use crate::snapshot::{list_snapshots, SNAPSHOT_PATTERN};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// One exported document with `_id` already dropped.
pub type Document = serde_json::Map<String, serde_json::Value>;

#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn list_collection_names(&self) -> Result<Vec<String>>;

    async fn fetch_documents(&self, collection: &str) -> Result<Vec<Document>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub collection: String,
    pub records: usize,
    pub path: PathBuf,
}

/// Lexicographically last collection name carrying `prefix`.
pub fn latest_collection<'a, I>(names: I, prefix: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .filter(|n| n.starts_with(prefix))
        .max()
        .cloned()
}

pub fn snapshot_file_name(now: NaiveDateTime) -> String {
    format!("mongodb_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub async fn select_collection(source: &dyn DocumentSource, prefix: &str) -> Result<String> {
    let names = source
        .list_collection_names()
        .await
        .map_err(|e| SnapshotError::upstream(&e))?;

    latest_collection(&names, prefix).ok_or_else(|| {
        SnapshotError::Upstream(format!(
            "no collection with prefix {prefix} in {}",
            source.source_name()
        ))
        .into()
    })
}

/// Pulls the newest source collection and writes it as a new snapshot in `dir`.
///
/// Writes nothing on failure.
pub async fn run_fetch(
    source: &dyn DocumentSource,
    dir: &Path,
    prefix: &str,
    now: NaiveDateTime,
) -> Result<FetchReport> {
    let collection = select_collection(source, prefix).await?;
    tracing::info!(%collection, "latest source collection");

    let documents = source
        .fetch_documents(&collection)
        .await
        .map_err(|e| SnapshotError::upstream(&e))?;
    if documents.is_empty() {
        return Err(SnapshotError::Upstream(format!("collection {collection} is empty")).into());
    }
    let records = documents.len();
    tracing::info!(%collection, records, "fetched source documents");

    let target = dir.join(snapshot_file_name(now));
    let path = tokio::task::spawn_blocking(move || writer::write_snapshot(&documents, &target))
        .await
        .context("join snapshot writer task failed")??;
    tracing::info!(file = %path.display(), "snapshot written");

    Ok(FetchReport {
        collection,
        records,
        path,
    })
}

/// Connects to the configured document store, runs one fetch into `dir`, and
/// closes the connection whatever the outcome.
pub async fn run_mongo_fetch(settings: &Settings, dir: &Path, now: NaiveDateTime) -> Result<FetchReport> {
    let uri = settings.require_mongo_db_url()?;
    let source = MongoSource::connect(uri, &settings.mongo_database)
        .await
        .map_err(|e| SnapshotError::upstream(&e))?;

    let res = run_fetch(&source, dir, &settings.collection_prefix, now).await;
    source.close().await;
    res
}

#[derive(Debug)]
pub enum StartupData {
    Fresh(FetchReport),
    Stale { existing: usize },
}

/// Decides whether the service may start after a fetch attempt: a failed fetch
/// is tolerated only if `dir` already holds at least one snapshot.
pub fn resolve_startup(fetch: Result<FetchReport>, dir: &Path) -> Result<StartupData> {
    let err = match fetch {
        Ok(report) => return Ok(StartupData::Fresh(report)),
        Err(err) => err,
    };

    let existing = list_snapshots(dir, SNAPSHOT_PATTERN)
        .map(|found| found.len())
        .unwrap_or(0);
    if existing == 0 {
        return Err(err.context(format!(
            "fetch failed and no snapshot files are available in {}",
            dir.display()
        )));
    }

    tracing::warn!(
        error = %format!("{err:#}"),
        existing,
        "fetch failed; using existing snapshot files, data may not be up to date"
    );
    Ok(StartupData::Stale { existing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeSource {
        collections: Vec<String>,
        documents: HashMap<String, Vec<Document>>,
        unreachable: bool,
    }

    impl FakeSource {
        fn new(collections: &[&str]) -> Self {
            Self {
                collections: collections.iter().map(|s| s.to_string()).collect(),
                documents: HashMap::new(),
                unreachable: false,
            }
        }

        fn with_docs(mut self, collection: &str, n: usize) -> Self {
            let docs = (0..n)
                .map(|i| {
                    match json!({
                        "Ticker": "AAPL",
                        "Model": "modelA",
                        "Month-Year": "2024-03",
                        "Index": i,
                        "Actual": 1,
                        "Prediction": 1,
                        "Prob_Class_0": 0.2,
                        "Prob_Class_1": 0.8,
                        "Correct": 1,
                    }) {
                        serde_json::Value::Object(m) => m,
                        _ => unreachable!(),
                    }
                })
                .collect();
            self.documents.insert(collection.to_string(), docs);
            self
        }
    }

    #[async_trait::async_trait]
    impl DocumentSource for FakeSource {
        fn source_name(&self) -> &'static str {
            "fake"
        }

        async fn list_collection_names(&self) -> Result<Vec<String>> {
            anyhow::ensure!(!self.unreachable, "connection refused");
            Ok(self.collections.clone())
        }

        async fn fetch_documents(&self, collection: &str) -> Result<Vec<Document>> {
            Ok(self.documents.get(collection).cloned().unwrap_or_default())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    fn is_upstream(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<SnapshotError>(), Some(SnapshotError::Upstream(_)))
    }

    #[test]
    fn latest_collection_is_lexicographic_max_with_prefix() {
        let names: Vec<String> = ["Net_Data_20240101", "Net_Data_20240301", "Other_20250101", "Net_Data_20240201"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            latest_collection(&names, "Net_Data_"),
            Some("Net_Data_20240301".to_string())
        );
        assert_eq!(latest_collection(&names, "Missing_"), None);
    }

    #[test]
    fn file_name_embeds_timestamp() {
        assert_eq!(snapshot_file_name(now()), "mongodb_data_20240301_090507.csv");
    }

    #[tokio::test]
    async fn run_fetch_writes_latest_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::new(&["Net_Data_20240101", "Net_Data_20240301"])
            .with_docs("Net_Data_20240101", 1)
            .with_docs("Net_Data_20240301", 3);

        let report = run_fetch(&source, tmp.path(), "Net_Data_", now()).await.unwrap();
        assert_eq!(report.collection, "Net_Data_20240301");
        assert_eq!(report.records, 3);
        assert_eq!(report.path, tmp.path().join("mongodb_data_20240301_090507.csv"));

        let table = crate::snapshot::load_snapshot(&report.path).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn missing_source_collection_is_upstream_and_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::new(&["Other"]);

        let err = run_fetch(&source, tmp.path(), "Net_Data_", now()).await.unwrap_err();
        assert!(is_upstream(&err));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_collection_is_upstream() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FakeSource::new(&["Net_Data_20240301"]).with_docs("Net_Data_20240301", 0);

        let err = run_fetch(&source, tmp.path(), "Net_Data_", now()).await.unwrap_err();
        assert!(is_upstream(&err));
    }

    #[tokio::test]
    async fn unreachable_store_is_upstream() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(&["Net_Data_20240301"]);
        source.unreachable = true;

        let err = run_fetch(&source, tmp.path(), "Net_Data_", now()).await.unwrap_err();
        assert!(is_upstream(&err));
        assert!(format!("{err:#}").contains("connection refused"));
    }

    #[test]
    fn startup_tolerates_failed_fetch_with_existing_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mongodb_data_20240101_000000.csv"), "Ticker\n").unwrap();

        let res = resolve_startup(Err(anyhow::anyhow!("boom")), tmp.path()).unwrap();
        assert!(matches!(res, StartupData::Stale { existing: 1 }));
    }

    #[test]
    fn startup_aborts_without_any_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.csv"), "x\n").unwrap();

        assert!(resolve_startup(Err(anyhow::anyhow!("boom")), tmp.path()).is_err());
        assert!(resolve_startup(Err(anyhow::anyhow!("boom")), &tmp.path().join("absent")).is_err());
    }

    #[test]
    fn startup_uses_fresh_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let report = FetchReport {
            collection: "Net_Data_20240301".to_string(),
            records: 1,
            path: tmp.path().join("mongodb_data_20240301_090507.csv"),
        };
        let res = resolve_startup(Ok(report.clone()), tmp.path()).unwrap();
        assert!(matches!(res, StartupData::Fresh(r) if r == report));
    }
}
