//! Platform-specific logging directory resolution.

use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "glance";

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/glance/logs` or `~/.local/state/glance/logs` |
/// | macOS | `~/Library/Logs/glance` |
/// | Windows | `%LOCALAPPDATA%\glance\glance\logs` |
///
/// Falls back to a directory under the system temp dir when no home
/// directory can be determined.
pub fn log_dir() -> PathBuf {
    let Some(base) = ProjectDirs::from("", "", APP_NAME) else {
        return std::env::temp_dir().join(APP_NAME).join("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().join("state"))
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/glance; logs belong
        // in ~/Library/Logs/glance.
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        library.join("Logs").join(APP_NAME)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

/// Ensures the log directory exists, creating it if necessary.
pub fn ensure_log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// File name prefix for the rolling log appender.
///
/// The appender creates dated files such as `glance.log.2026-10-19`.
pub const LOG_FILE_PREFIX: &str = "glance.log";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_mentions_app() {
        let dir = log_dir();
        assert!(dir.to_string_lossy().contains(APP_NAME));
    }
}
