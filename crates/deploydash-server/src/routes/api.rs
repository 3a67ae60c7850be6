use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use deploydash_core::branches::BranchListing;
use deploydash_core::logs::read_log;
use deploydash_core::runner::{RunOutcome, RunSummary, Script};
use deploydash_core::settings::REFRESH_INTERVAL;
use deploydash_core::updater::UpdateReport;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::actions::{self, RunForm, BUSY_MESSAGE};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusBody {
    pub running: bool,
    pub current: Option<RunSummary>,
    pub refresh_seconds: u64,
}

/// GET /api/status: observe the run state and report it.
pub async fn status(State(app): State<AppState>) -> Json<StatusBody> {
    app.observe_run();
    let current = app.run_state().current();
    Json(StatusBody {
        running: current.is_some(),
        current,
        refresh_seconds: REFRESH_INTERVAL.as_secs(),
    })
}

/// GET /api/branches: the (possibly cached) branch listing.
pub async fn branches(State(app): State<AppState>) -> Json<BranchListing> {
    Json(app.branches.list_branches().await)
}

/// GET /api/logs/{name}: `build` or `app`, as plain text.
pub async fn log(State(app): State<AppState>, Path(name): Path<String>) -> Result<Response, AppError> {
    let path = match name.as_str() {
        "build" => app.settings.build_log(),
        "app" => app.settings.app_log(),
        other => return Err(AppError::not_found(format!("unknown log '{other}'"))),
    };
    let text = tokio::task::spawn_blocking(move || read_log(&path))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

/// POST /api/run/{script}?branch=...: 202 when started, 409 while busy.
pub async fn run(
    State(app): State<AppState>,
    Path(script): Path<String>,
    Query(query): Query<RunForm>,
) -> Result<Response, AppError> {
    let script: Script = script.parse().map_err(AppError::not_found)?;
    match actions::start_script(&app, script, query.branch.as_deref())? {
        RunOutcome::Started => {
            let current = app.run_state().current();
            Ok((StatusCode::ACCEPTED, Json(current)).into_response())
        }
        RunOutcome::Busy => Err(AppError::conflict(BUSY_MESSAGE)),
    }
}

/// POST /api/update: refresh the deploy tooling.
pub async fn update(State(app): State<AppState>) -> Result<Json<UpdateReport>, AppError> {
    Ok(Json(actions::update_tooling(&app).await?))
}
