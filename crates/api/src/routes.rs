use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use stockpred_core::domain::prediction::{FilterQuery, PredictionRecord};
use stockpred_core::query::{self, AvailableFilters, QueryStatistics};
use stockpred_core::snapshot::{load_latest, SnapshotTable, SNAPSHOT_PATTERN};
use stockpred_core::SnapshotError;

#[derive(Debug, Clone)]
pub struct AppState {
    pub snapshot_dir: PathBuf,
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/test", get(introspect))
        .route("/stock-prediction", get(stock_prediction))
        .route("/available-filters", get(available_filters))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed query string.
    BadRequest(QueryRejection),
    /// Snapshot could not be served for the introspection endpoint.
    Unavailable(SnapshotError),
    Snapshot(SnapshotError),
    Internal(anyhow::Error),
}

impl From<SnapshotError> for ApiError {
    fn from(e: SnapshotError) -> Self {
        ApiError::Snapshot(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Snapshot(e) if e.is_no_matching_rows() => StatusCode::NOT_FOUND,
            ApiError::Snapshot(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "rejected query string");
                ErrorBody {
                    status: "error",
                    kind: "bad_request",
                    message: rejection.body_text(),
                }
            }
            ApiError::Snapshot(e) if e.is_no_matching_rows() => {
                tracing::warn!(error = %e, "no rows for query");
                ErrorBody {
                    status: "error",
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
            ApiError::Unavailable(e) | ApiError::Snapshot(e) => {
                sentry::capture_error(e);
                tracing::error!(error = %e, kind = e.kind(), detail = ?e, "request failed");
                ErrorBody {
                    status: "error",
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
            ApiError::Internal(e) => {
                sentry_anyhow::capture_anyhow(e);
                tracing::error!(error = %format!("{e:#}"), detail = ?e, "request failed");
                ErrorBody {
                    status: "error",
                    kind: "internal",
                    message: format!("{e:#}"),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Locates and loads the newest snapshot off the async runtime. Every request
/// re-reads from disk.
async fn load_table(dir: PathBuf) -> Result<SnapshotTable, ApiError> {
    let res = tokio::task::spawn_blocking(move || load_latest(&dir, SNAPSHOT_PATTERN))
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("join snapshot load task failed")))?;
    Ok(res?)
}

#[derive(Debug, Serialize)]
pub struct Introspection {
    status: &'static str,
    file: String,
    rows: usize,
    columns: Vec<String>,
}

async fn introspect(State(state): State<AppState>) -> Result<Json<Introspection>, ApiError> {
    let table = load_table(state.snapshot_dir).await.map_err(|e| match e {
        ApiError::Snapshot(e) => ApiError::Unavailable(e),
        other => other,
    })?;

    Ok(Json(Introspection {
        status: "success",
        file: table.path().display().to_string(),
        rows: table.len(),
        columns: table.columns().to_vec(),
    }))
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    status: &'static str,
    timestamp: String,
    query_params: FilterQuery,
    statistics: QueryStatistics,
    data: Vec<PredictionRecord>,
}

async fn stock_prediction(
    State(state): State<AppState>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Query(params) = params.map_err(ApiError::BadRequest)?;
    let table = load_table(state.snapshot_dir).await?;
    let result = query::query(&table, &params)?;

    Ok(Json(PredictionResponse {
        status: "success",
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        query_params: params,
        statistics: result.statistics,
        data: result.rows,
    }))
}

async fn available_filters(
    State(state): State<AppState>,
) -> Result<Json<AvailableFilters>, ApiError> {
    let table = load_table(state.snapshot_dir).await?;
    Ok(Json(query::available_filters(&table)))
}
