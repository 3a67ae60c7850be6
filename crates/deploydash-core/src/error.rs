use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config is missing required key '{0}'")]
    MissingConfigKey(String),

    #[error("config key '{key}' is invalid: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("invalid branch name '{0}'")]
    InvalidBranch(String),

    #[error("failed to start {script}: {source}")]
    SpawnFailed {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git is not installed or not on PATH")]
    GitNotFound,

    #[error("repository clone failed: {0}")]
    CloneFailed(String),

    #[error("repository has no 'deploy' directory")]
    MissingDeployDir,

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("github request failed: {0}")]
    Github(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
