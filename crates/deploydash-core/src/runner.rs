use crate::error::{DeployError, Result};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{BufRead, BufReader, PipeReader};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::{Child, Command};

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// The three operator scripts living in the base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Deploy,
    Stop,
    Restart,
}

impl Script {
    pub fn all() -> &'static [Script] {
        &[Script::Deploy, Script::Stop, Script::Restart]
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Script::Deploy => "deploy.sh",
            Script::Stop => "stop.sh",
            Script::Restart => "restart.sh",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Script::Deploy => "deploy",
            Script::Stop => "stop",
            Script::Restart => "restart",
        }
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

impl std::str::FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Script::all()
            .iter()
            .copied()
            .find(|script| script.as_str() == s || script.file_name() == s)
            .ok_or_else(|| format!("unknown script '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

struct ActiveRun {
    script: Script,
    branch: Option<String>,
    started_at: DateTime<Utc>,
    started: Instant,
    child: Child,
}

/// Snapshot of the in-flight run for display.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub script: Script,
    pub branch: Option<String>,
    pub started_at: DateTime<Utc>,
    pub pid: Option<u32>,
}

/// Reported once, by the observation that first sees the child exited.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub script: Script,
    pub branch: Option<String>,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub duration_seconds: f64,
}

impl Completion {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Tracks at most one launched script. Running iff a child handle is held.
///
/// Only [`ScriptRunner::run`] fills it and only [`RunState::observe`] empties it.
#[derive(Default)]
pub struct RunState {
    active: Option<ActiveRun>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<RunSummary> {
        self.active.as_ref().map(|run| RunSummary {
            script: run.script,
            branch: run.branch.clone(),
            started_at: run.started_at,
            pid: run.child.id(),
        })
    }

    /// Non-blocking check of the held child. Clears the state and returns the
    /// completion if it has exited or can no longer be polled; otherwise
    /// leaves everything as is.
    pub fn observe(&mut self) -> Option<Completion> {
        let run = self.active.as_mut()?;
        let script = run.script;
        let exit_code = settled(script, run.child.try_wait())?;

        let run = self.active.take()?;
        let completion = Completion {
            script: run.script,
            branch: run.branch,
            exit_code,
            duration_seconds: run.started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            script = %completion.script,
            exit_code = ?completion.exit_code,
            duration_seconds = completion.duration_seconds,
            "script finished"
        );
        Some(completion)
    }
}

/// `None` while the child is still running. A failed poll ends the run with
/// no exit code, since the child can never be observed again.
fn settled(script: Script, poll: std::io::Result<Option<ExitStatus>>) -> Option<Option<i32>> {
    match poll {
        Ok(Some(status)) => Some(status.code()),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(%script, error = %e, "failed to poll script, treating it as finished");
            Some(None)
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Started,
    /// Another script is still running; nothing was done.
    Busy,
}

/// Launches the operator scripts. Must be used inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    settings: Settings,
}

impl ScriptRunner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Start `script` with `branch` as its only argument, unless a run is
    /// already active.
    ///
    /// A deploy truncates the build log first. The child's stderr is
    /// redirected into its stdout, and that single stream is forwarded to the
    /// `script` log target.
    pub fn run(
        &self,
        state: &mut RunState,
        script: Script,
        branch: Option<&str>,
    ) -> Result<RunOutcome> {
        if state.is_running() {
            tracing::info!(%script, "run requested while another script is active, ignoring");
            return Ok(RunOutcome::Busy);
        }

        let branch = branch.filter(|b| !b.is_empty());
        if let Some(b) = branch {
            validate_branch(b)?;
        }

        if script == Script::Deploy {
            std::fs::File::create(self.settings.build_log())?;
        }

        let (output, writer) = std::io::pipe()?;
        let mut cmd = Command::new(self.settings.script_path(script.file_name()));
        cmd.args(branch)
            .current_dir(&self.settings.base_dir)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let spawned = cmd.spawn();
        // The parent's copies of the write end must close for the reader to
        // see EOF when the child exits.
        drop(cmd);
        let child = spawned.map_err(|source| DeployError::SpawnFailed {
            script: script.file_name().to_string(),
            source,
        })?;
        forward_output(script, output);

        tracing::info!(%script, branch = ?branch, pid = ?child.id(), "script started");
        state.active = Some(ActiveRun {
            script,
            branch: branch.map(String::from),
            started_at: Utc::now(),
            started: Instant::now(),
            child,
        });
        Ok(RunOutcome::Started)
    }
}

/// Reject names git would not produce and that a script could mistake for
/// an option.
pub fn validate_branch(branch: &str) -> Result<()> {
    if branch.starts_with('-')
        || branch
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(DeployError::InvalidBranch(branch.to_string()));
    }
    Ok(())
}

/// Log the child's combined output line by line until every writer closes.
fn forward_output(script: Script, output: PipeReader) {
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(output);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']);
                    tracing::info!(target: "script", script = %script, "{line}");
                }
                Err(e) => {
                    tracing::warn!(%script, error = %e, "failed to read script output");
                    break;
                }
            }
        }
    });
}
