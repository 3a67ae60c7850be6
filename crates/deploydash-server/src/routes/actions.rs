use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::Form;
use deploydash_core::runner::{RunOutcome, Script};
use deploydash_core::updater::{self, UpdateReport};
use deploydash_core::DeployError;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::{AppState, Notice, NoticeLevel};

pub const BUSY_MESSAGE: &str = "Another script is already running.";

#[derive(Deserialize, Default)]
pub struct RunForm {
    #[serde(default)]
    pub branch: Option<String>,
}

/// Start `script` against the shared run state. Only deploy takes a branch.
pub(crate) fn start_script(
    app: &AppState,
    script: Script,
    branch: Option<&str>,
) -> Result<RunOutcome, DeployError> {
    let branch = if script == Script::Deploy { branch } else { None };
    let mut run = app.run_state();
    app.runner.run(&mut run, script, branch)
}

/// Refresh the deploy tooling on a blocking thread.
pub(crate) async fn update_tooling(app: &AppState) -> anyhow::Result<UpdateReport> {
    let url = app.settings.tooling_repo.clone();
    let target = app.settings.base_dir.clone();
    let report = tokio::task::spawn_blocking(move || updater::update(&url, &target))
        .await
        .map_err(|e| anyhow::anyhow!("task join error: {e}"))??;
    Ok(report)
}

fn started_message(script: Script, branch: Option<&str>) -> String {
    match (script, branch) {
        (Script::Deploy, Some(b)) if !b.is_empty() => format!("Deploying branch '{b}'..."),
        (Script::Deploy, _) => "Deploying...".to_string(),
        (Script::Stop, _) => "Stopping server...".to_string(),
        (Script::Restart, _) => "Restarting server...".to_string(),
    }
}

/// POST /actions/{script}: form submit from the dashboard; always redirects
/// back with a notice describing what happened.
pub async fn run_action(
    State(app): State<AppState>,
    Path(action): Path<String>,
    Form(form): Form<RunForm>,
) -> Result<Redirect, AppError> {
    let script: Script = action.parse().map_err(AppError::not_found)?;
    let branch = form.branch.as_deref();

    let notice = match start_script(&app, script, branch) {
        Ok(RunOutcome::Started) => Notice::new(NoticeLevel::Info, started_message(script, branch)),
        Ok(RunOutcome::Busy) => Notice::new(NoticeLevel::Warning, BUSY_MESSAGE),
        Err(e) => {
            tracing::error!(%script, error = %e, "failed to start script");
            Notice::new(NoticeLevel::Error, format!("Could not start {script}: {e}"))
        }
    };
    app.push_notice(notice);
    Ok(Redirect::to("/"))
}

/// POST /actions/update: refresh the deploy tooling, then redirect back.
pub async fn update_action(State(app): State<AppState>) -> Redirect {
    let notice = match update_tooling(&app).await {
        Ok(report) => Notice::new(
            NoticeLevel::Success,
            format!(
                "Deploy tooling updated ({} entries) and made executable.",
                report.installed.len()
            ),
        ),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "deploy tooling update failed");
            Notice::new(NoticeLevel::Error, format!("Update failed: {e:#}"))
        }
    };
    app.push_notice(notice);
    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_message_names_branch() {
        assert_eq!(
            started_message(Script::Deploy, Some("feature/x")),
            "Deploying branch 'feature/x'..."
        );
        assert_eq!(started_message(Script::Stop, Some("ignored")), "Stopping server...");
    }
}
