use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpred_core::fetch::{self, StartupData};

mod routes;

#[derive(Debug, Parser)]
#[command(name = "stockpred_api")]
struct Args {
    /// Run the fetch job once before serving. A failed fetch is tolerated when
    /// snapshot files already exist locally.
    #[arg(long)]
    fetch_on_start: bool,

    /// Overrides PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides SNAPSHOT_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockpred_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);
    init_tracing(settings.log_dir.as_deref())?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(|| settings.snapshot_dir.clone());
    let port = args.port.unwrap_or(settings.port);

    if args.fetch_on_start {
        tracing::info!(dir = %data_dir.display(), "fetching latest snapshot before serving");
        let now = chrono::Local::now().naive_local();
        let outcome = fetch::run_mongo_fetch(&settings, &data_dir, now).await;
        if let Err(e) = &outcome {
            sentry_anyhow::capture_anyhow(e);
        }
        match fetch::resolve_startup(outcome, &data_dir)? {
            StartupData::Fresh(report) => tracing::info!(
                collection = %report.collection,
                records = report.records,
                file = %report.path.display(),
                "snapshot refreshed"
            ),
            StartupData::Stale { existing } => {
                tracing::warn!(existing, "serving existing snapshots")
            }
        }
    }

    let state = routes::AppState {
        snapshot_dir: data_dir,
    };
    let app = routes::router(state, &settings.static_dir);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let name = format!("{}.log", chrono::Local::now().format("%m_%d_%Y_%H_%M_%S"));
            let file = std::fs::File::create(dir.join(&name))
                .with_context(|| format!("failed to create log file {name}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(sentry_tracing::layer())
        .init();
    Ok(())
}
