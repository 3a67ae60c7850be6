pub mod branches;
pub mod config;
pub mod error;
pub mod logs;
pub mod runner;
pub mod settings;
pub mod updater;

pub use error::{DeployError, Result};
