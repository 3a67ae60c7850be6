use clap::Args;
use deploydash_core::settings::{
    Settings, DEFAULT_BASE_DIR, DEFAULT_ENV_FILE, DEFAULT_GITHUB_API, DEFAULT_LOG_DIR,
    DEFAULT_OWNER, DEFAULT_REPO, DEFAULT_TOOLING_REPO,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding deploy.sh, stop.sh, restart.sh and build.log
    #[arg(long, global = true, env = "DEPLOYDASH_BASE_DIR", default_value = DEFAULT_BASE_DIR)]
    pub base_dir: PathBuf,

    /// Directory holding the application log
    #[arg(long, global = true, env = "DEPLOYDASH_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Auth config (default: <base-dir>/config.yaml)
    #[arg(long, global = true, env = "DEPLOYDASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// dotenv file loaded before reading GITHUB_TOKEN
    #[arg(long, global = true, env = "DEPLOYDASH_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// GitHub API base URL
    #[arg(long, global = true, env = "DEPLOYDASH_GITHUB_API", default_value = DEFAULT_GITHUB_API)]
    pub github_api: String,

    /// Owner of the deployed repository
    #[arg(long, global = true, default_value = DEFAULT_OWNER)]
    pub owner: String,

    /// Name of the deployed repository
    #[arg(long, global = true, default_value = DEFAULT_REPO)]
    pub repo: String,

    /// Repository whose deploy/ directory is installed by `update`
    #[arg(long, global = true, env = "DEPLOYDASH_TOOLING_REPO", default_value = DEFAULT_TOOLING_REPO)]
    pub tooling_repo: String,
}

/// Build the runtime settings. Loads the env file first so `GITHUB_TOKEN`
/// may come from it; variables already set in the environment win.
pub fn resolve(args: &GlobalArgs) -> Settings {
    match dotenvy::from_path(&args.env_file) {
        Ok(()) => tracing::debug!(path = %args.env_file.display(), "loaded env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(path = %args.env_file.display(), error = %e, "failed to load env file"),
    }

    let mut settings = Settings::with_base_dir(&args.base_dir);
    if let Some(config) = &args.config {
        settings.config_path = config.clone();
    }
    settings.log_dir = args.log_dir.clone();
    settings.github_api = args.github_api.clone();
    settings.owner = args.owner.clone();
    settings.repo = args.repo.clone();
    settings.tooling_repo = args.tooling_repo.clone();
    settings.github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    settings
}
