use crate::error::{DeployError, Result};
use filetime::FileTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Directory inside the tooling repository whose entries are installed.
pub const DEPLOY_SUBDIR: &str = "deploy";

/// Mode applied to everything installed by an update.
pub const INSTALLED_MODE: u32 = 0o755;

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    /// Top-level paths written under the target directory.
    pub installed: Vec<PathBuf>,
}

/// Refresh the deploy tooling in `target_dir` from `repo_url`.
///
/// Shallow-clones into a temporary directory that is removed on every exit
/// path, then installs the repository's `deploy/` entries. Blocking.
pub fn update(repo_url: &str, target_dir: &Path) -> Result<UpdateReport> {
    let git = which::which("git").map_err(|_| DeployError::GitNotFound)?;
    let checkout = tempfile::Builder::new()
        .prefix("deploydash-update-")
        .tempdir()?;

    tracing::info!(repo = repo_url, target = %target_dir.display(), "updating deploy tooling");
    clone_shallow(&git, repo_url, checkout.path())?;
    let report = install_from_checkout(checkout.path(), target_dir)?;
    tracing::info!(entries = report.installed.len(), "deploy tooling updated");
    Ok(report)
}

fn clone_shallow(git: &Path, repo_url: &str, dest: &Path) -> Result<()> {
    let output = Command::new(git)
        .args(["clone", "--depth", "1", "--quiet"])
        .arg(repo_url)
        .arg(dest)
        .output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(DeployError::CloneFailed(stderr));
    }
    Ok(())
}

/// Copy every top-level entry of `<checkout>/deploy` over `target_dir` and
/// chmod the result to [`INSTALLED_MODE`].
///
/// Directories replace any existing directory of the same name; files are
/// overwritten. The target is left untouched when `deploy/` is absent.
pub fn install_from_checkout(checkout: &Path, target_dir: &Path) -> Result<UpdateReport> {
    let src_dir = checkout.join(DEPLOY_SUBDIR);
    if !src_dir.is_dir() {
        return Err(DeployError::MissingDeployDir);
    }

    let mut entries = std::fs::read_dir(&src_dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    std::fs::create_dir_all(target_dir)?;
    let mut installed = Vec::with_capacity(entries.len());
    for entry in entries {
        let src = entry.path();
        let dest = target_dir.join(entry.file_name());
        if src.is_dir() {
            if dest.is_dir() {
                std::fs::remove_dir_all(&dest).map_err(|source| copy_err(&dest, source))?;
            } else if dest.exists() {
                std::fs::remove_file(&dest).map_err(|source| copy_err(&dest, source))?;
            }
            copy_tree(&src, &dest)?;
        } else {
            copy_file(&src, &dest)?;
        }
        installed.push(dest);
    }

    for path in &installed {
        set_mode_recursive(path, INSTALLED_MODE)?;
    }

    Ok(UpdateReport { installed })
}

fn copy_err(path: &Path, source: std::io::Error) -> DeployError {
    DeployError::Copy {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy a file's bytes, mode and timestamps.
fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    std::fs::copy(src, dest).map_err(|source| copy_err(src, source))?;
    copy_times(src, dest)
}

fn copy_times(src: &Path, dest: &Path) -> Result<()> {
    let meta = std::fs::metadata(src).map_err(|source| copy_err(src, source))?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(|source| copy_err(dest, source))
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| copy_err(src, e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let out = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&out).map_err(|source| copy_err(&out, source))?;
            dirs.push((entry.into_path(), out));
        } else {
            copy_file(entry.path(), &out)?;
        }
    }
    // Children first, so writing files does not bump a parent's restored mtime.
    for (src_dir, out_dir) in dirs.iter().rev() {
        copy_times(src_dir, out_dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode_recursive(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| copy_err(path, e.into()))?;
        std::fs::set_permissions(entry.path(), std::fs::Permissions::from_mode(mode))
            .map_err(|source| copy_err(entry.path(), source))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode_recursive(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
