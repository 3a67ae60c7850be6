use axum::extract::State;
use axum::response::Html;
use axum::Extension;
use deploydash_core::logs::read_log;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::render::{self, DashboardView};
use crate::state::AppState;

/// GET /: one full render of the dashboard.
///
/// Runs an observation cycle first so a finished script is reported and the
/// controls re-enabled on this render.
pub async fn dashboard(
    State(app): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    app.observe_run();
    let running = app.run_state().current();
    let notices = app.take_notices();
    let branches = app.branches.list_branches().await;

    let build_path = app.settings.build_log();
    let app_path = app.settings.app_log();
    let (build_log, app_log) =
        tokio::task::spawn_blocking(move || (read_log(&build_path), read_log(&app_path)))
            .await
            .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    let html = render::dashboard_page(&DashboardView {
        display_name: app.auth.display_name(&user.username),
        branches: &branches,
        running: running.as_ref(),
        notices: &notices,
        build_log: &build_log,
        app_log: &app_log,
    });
    Ok(Html(html))
}
