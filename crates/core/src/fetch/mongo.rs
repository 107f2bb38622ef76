use crate::fetch::{Document, DocumentSource};
use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::Client;
use serde_json::Value;

/// Document-store connection owned by one fetch run.
///
/// Built with `connect` and released with `close`; nothing is kept in globals.
#[derive(Debug, Clone)]
pub struct MongoSource {
    client: Client,
    database: String,
}

impl MongoSource {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("failed to build document store client")?;

        // The driver connects lazily; ping so an unreachable store fails here.
        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await
            .context("document store ping failed")?;

        tracing::info!(database, "connected to document store");
        Ok(Self {
            client,
            database: database.to_string(),
        })
    }

    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

#[async_trait::async_trait]
impl DocumentSource for MongoSource {
    fn source_name(&self) -> &'static str {
        "mongodb"
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .with_context(|| format!("list collections in {} failed", self.database))
    }

    async fn fetch_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let cursor = self
            .client
            .database(&self.database)
            .collection::<bson::Document>(collection)
            .find(doc! {})
            .projection(doc! { "_id": 0 })
            .await
            .with_context(|| format!("find on collection {collection} failed"))?;

        let docs: Vec<bson::Document> = cursor
            .try_collect()
            .await
            .with_context(|| format!("read documents from {collection} failed"))?;

        docs.into_iter().map(into_json_object).collect()
    }
}

fn into_json_object(doc: bson::Document) -> Result<Document> {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("document did not convert to a JSON object: {other}"),
    }
}
