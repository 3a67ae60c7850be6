use std::path::Path;

/// Shown in place of a log that has not been written yet.
pub const LOG_PLACEHOLDER: &str = "log file not yet created.";

/// Read the whole log at `path`. A missing file yields [`LOG_PLACEHOLDER`];
/// other read failures are rendered as a one-line message.
pub fn read_log(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => LOG_PLACEHOLDER.to_string(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read log");
            format!("failed to read {}: {e}", path.display())
        }
    }
}
