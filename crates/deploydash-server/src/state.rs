use deploydash_core::branches::BranchLister;
use deploydash_core::config::AuthConfig;
use deploydash_core::runner::{Completion, RunState, ScriptRunner};
use deploydash_core::settings::{Settings, REFRESH_INTERVAL};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;

/// Notices kept while nobody loads the dashboard.
const MAX_PENDING_NOTICES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A one-shot message shown on the next dashboard render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    fn for_completion(done: &Completion) -> Self {
        if done.success() {
            Self::new(
                NoticeLevel::Success,
                format!("{} finished successfully.", done.script),
            )
        } else {
            let code = done
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Self::new(
                NoticeLevel::Warning,
                format!("{} finished with exit status {code}.", done.script),
            )
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthConfig>,
    pub runner: ScriptRunner,
    pub branches: Arc<BranchLister>,
    run: Arc<Mutex<RunState>>,
    notices: Arc<Mutex<VecDeque<Notice>>>,
}

impl AppState {
    pub fn new(settings: Settings, auth: AuthConfig) -> anyhow::Result<Self> {
        let branches = BranchLister::from_settings(&settings)?;
        let state = Self {
            runner: ScriptRunner::new(&settings),
            settings: Arc::new(settings),
            auth: Arc::new(auth),
            branches: Arc::new(branches),
            run: Arc::new(Mutex::new(RunState::new())),
            notices: Arc::new(Mutex::new(VecDeque::new())),
        };

        // Observe the running script on a fixed tick so completion is noticed
        // even while no browser has the dashboard open.
        // Guard: only spawn if inside a Tokio runtime (skipped in sync unit tests).
        if tokio::runtime::Handle::try_current().is_ok() {
            let ticker_state = state.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    ticker_state.observe_run();
                }
            });
        }

        Ok(state)
    }

    /// Exclusive access to the run state. Never held across an await.
    pub fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One observation cycle: clear the run state if the child exited and
    /// queue a completion notice.
    pub fn observe_run(&self) -> Option<Completion> {
        let done = self.run_state().observe()?;
        self.push_notice(Notice::for_completion(&done));
        Some(done)
    }

    pub fn push_notice(&self, notice: Notice) {
        let mut notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        if notices.len() == MAX_PENDING_NOTICES {
            notices.pop_front();
        }
        notices.push_back(notice);
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        notices.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploydash_core::runner::Script;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn auth() -> AuthConfig {
        AuthConfig::parse(
            "cookie: { name: c, key: k, expiry_days: 1 }\ncredentials:\n  usernames: {}\n",
        )
        .unwrap()
    }

    #[test]
    fn new_state_is_idle() {
        let state = AppState::new(Settings::with_base_dir("/tmp/deploy"), auth()).unwrap();
        assert!(!state.run_state().is_running());
        assert!(state.observe_run().is_none());
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn notices_drain_once() {
        let state = AppState::new(Settings::default(), auth()).unwrap();
        state.push_notice(Notice::new(NoticeLevel::Info, "hello"));
        assert_eq!(state.take_notices().len(), 1);
        assert!(state.take_notices().is_empty());
    }

    #[test]
    fn pending_notices_are_bounded() {
        let state = AppState::new(Settings::default(), auth()).unwrap();
        for i in 0..(MAX_PENDING_NOTICES + 5) {
            state.push_notice(Notice::new(NoticeLevel::Info, i.to_string()));
        }
        let notices = state.take_notices();
        assert_eq!(notices.len(), MAX_PENDING_NOTICES);
        assert_eq!(notices[0].message, "5");
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_records_completion_without_a_page_load() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("stop.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let state = AppState::new(Settings::with_base_dir(dir.path()), auth()).unwrap();
        {
            let mut run = state.run_state();
            state.runner.run(&mut run, Script::Stop, None).unwrap();
        }

        // Virtual time advances instantly; the child still exits in real time.
        let deadline = Instant::now() + Duration::from_secs(10);
        let notices = loop {
            tokio::time::sleep(REFRESH_INTERVAL).await;
            let notices = state.take_notices();
            if !notices.is_empty() {
                break notices;
            }
            assert!(Instant::now() < deadline, "ticker never observed the exit");
            std::thread::sleep(Duration::from_millis(20));
        };

        assert!(!state.run_state().is_running());
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert_eq!(notices[0].message, "stop.sh finished successfully.");
    }
}
