use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_DIR: &str = "/home/tools/deploy";
pub const DEFAULT_LOG_DIR: &str = "/home/logs";
pub const DEFAULT_ENV_FILE: &str = "/home/deploy/env";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_OWNER: &str = "Anipick-Team";
pub const DEFAULT_REPO: &str = "anipick-backend";
pub const DEFAULT_TOOLING_REPO: &str = "https://github.com/Anipick-Team/depoly_shell.git";

pub const BUILD_LOG_NAME: &str = "build.log";
pub const APP_LOG_NAME: &str = "springboot.log";
pub const CONFIG_NAME: &str = "config.yaml";

/// How often the dashboard re-renders and the run state is observed.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3);

/// How long a computed branch list is served before the API is asked again.
pub const BRANCH_CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolved locations and remote coordinates for one dashboard instance.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Holds `deploy.sh`, `stop.sh`, `restart.sh`, the build log and the
    /// config file. Self-update copies into this directory.
    pub base_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
    pub github_api: String,
    pub owner: String,
    pub repo: String,
    pub github_token: Option<String>,
    pub tooling_repo: String,
}

impl Settings {
    /// Settings rooted at `base_dir` with every other value at its default.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            config_path: base_dir.join(CONFIG_NAME),
            base_dir,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            github_api: DEFAULT_GITHUB_API.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            github_token: None,
            tooling_repo: DEFAULT_TOOLING_REPO.to_string(),
        }
    }

    pub fn build_log(&self) -> PathBuf {
        self.base_dir.join(BUILD_LOG_NAME)
    }

    pub fn app_log(&self) -> PathBuf {
        self.log_dir.join(APP_LOG_NAME)
    }

    pub fn script_path(&self, script_file: &str) -> PathBuf {
        self.base_dir.join(script_file)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_base_dir(DEFAULT_BASE_DIR)
    }
}
