pub mod domain;
pub mod error;
pub mod fetch;
pub mod query;
pub mod snapshot;

pub use error::{NotFound, Result, SnapshotError};

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    pub const DEFAULT_SNAPSHOT_DIR: &str = "Get_Data";
    pub const DEFAULT_STATIC_DIR: &str = "static";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const DEFAULT_MONGO_DATABASE: &str = "BACHV";
    pub const DEFAULT_COLLECTION_PREFIX: &str = "Net_Data_";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub snapshot_dir: PathBuf,
        pub static_dir: PathBuf,
        pub port: u16,
        pub mongo_db_url: Option<String>,
        pub mongo_database: String,
        pub collection_prefix: String,
        pub log_dir: Option<PathBuf>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let port = match non_empty_var("PORT") {
                Some(v) => v
                    .parse::<u16>()
                    .with_context(|| format!("PORT must be a valid port number (got {v})"))?,
                None => DEFAULT_PORT,
            };

            Ok(Self {
                snapshot_dir: non_empty_var("SNAPSHOT_DIR")
                    .unwrap_or_else(|| DEFAULT_SNAPSHOT_DIR.to_string())
                    .into(),
                static_dir: non_empty_var("STATIC_DIR")
                    .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                    .into(),
                port,
                mongo_db_url: non_empty_var("MONGO_DB_URL"),
                mongo_database: non_empty_var("MONGO_DATABASE")
                    .unwrap_or_else(|| DEFAULT_MONGO_DATABASE.to_string()),
                collection_prefix: non_empty_var("COLLECTION_PREFIX")
                    .unwrap_or_else(|| DEFAULT_COLLECTION_PREFIX.to_string()),
                log_dir: non_empty_var("LOG_DIR").map(PathBuf::from),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_mongo_db_url(&self) -> anyhow::Result<&str> {
            self.mongo_db_url
                .as_deref()
                .context("MONGO_DB_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
