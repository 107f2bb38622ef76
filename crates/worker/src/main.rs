use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpred_core::fetch;

#[derive(Debug, Parser)]
#[command(name = "stockpred_worker")]
struct Args {
    /// Directory the snapshot is written to. Overrides SNAPSHOT_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Source database. Overrides MONGO_DATABASE.
    #[arg(long)]
    database: Option<String>,

    /// Source collection name prefix. Overrides COLLECTION_PREFIX.
    #[arg(long)]
    collection_prefix: Option<String>,

    /// Select the collection and count its documents without writing a snapshot.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = stockpred_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(database) = args.database {
        settings.mongo_database = database;
    }
    if let Some(prefix) = args.collection_prefix {
        settings.collection_prefix = prefix;
    }
    let data_dir = args.data_dir.unwrap_or_else(|| settings.snapshot_dir.clone());

    let res = if args.dry_run {
        dry_run(&settings).await
    } else {
        run(&settings, &data_dir).await
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "fetch job failed");
    }
    res
}

async fn run(settings: &stockpred_core::config::Settings, data_dir: &Path) -> anyhow::Result<()> {
    let now = chrono::Local::now().naive_local();
    let report = fetch::run_mongo_fetch(settings, data_dir, now).await?;

    tracing::info!(
        collection = %report.collection,
        records = report.records,
        file = %report.path.display(),
        "snapshot saved"
    );
    Ok(())
}

async fn dry_run(settings: &stockpred_core::config::Settings) -> anyhow::Result<()> {
    let uri = settings.require_mongo_db_url()?;
    let source = fetch::MongoSource::connect(uri, &settings.mongo_database)
        .await
        .context("connect MONGO_DB_URL failed")?;

    let res = async {
        let collection = fetch::select_collection(&source, &settings.collection_prefix).await?;
        let documents = fetch::DocumentSource::fetch_documents(&source, &collection).await?;
        tracing::info!(
            %collection,
            records = documents.len(),
            dry_run = true,
            "latest collection inspected; nothing written"
        );
        anyhow::Ok(())
    }
    .await;

    source.close().await;
    res
}

fn init_sentry(settings: &stockpred_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
