//! Exit codes for the CLI.
//!
//! These codes enable scripting integration by providing structured
//! feedback about operation results.

use glance_types::{CaptureSessionState, FailureReason};

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Operation completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments
    InvalidArguments = 2,
    /// Window ID not found among capturable windows
    WindowNotFound = 3,
    /// Screen recording permission missing or configuration rejected
    ConfigurationError = 4,
    /// The source window closed during the preview
    SourceClosed = 5,
    /// The capture stream crashed or kept failing
    StreamFailed = 6,
    /// Window capture or focus is not available on this platform
    Unsupported = 7,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for the state a preview ended in.
    pub fn for_state(state: &CaptureSessionState) -> Self {
        match state {
            CaptureSessionState::Failed(reason) => match reason {
                FailureReason::Configuration { .. } => ExitCode::ConfigurationError,
                FailureReason::SourceClosed => ExitCode::SourceClosed,
                FailureReason::StreamCrashed { .. } | FailureReason::StreamUnstable { .. } => {
                    ExitCode::StreamFailed
                }
            },
            _ => ExitCode::Success,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::WindowNotFound => write!(f, "window not found"),
            ExitCode::ConfigurationError => write!(f, "permission or configuration problem"),
            ExitCode::SourceClosed => write!(f, "source window closed"),
            ExitCode::StreamFailed => write!(f, "capture stream failed"),
            ExitCode::Unsupported => write!(f, "unsupported platform"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_states_map_to_distinct_codes() {
        let configuration = CaptureSessionState::Failed(FailureReason::Configuration {
            detail: "denied".into(),
        });
        let closed = CaptureSessionState::Failed(FailureReason::SourceClosed);
        let unstable = CaptureSessionState::Failed(FailureReason::StreamUnstable { attempts: 4 });

        assert_eq!(ExitCode::for_state(&configuration), ExitCode::ConfigurationError);
        assert_eq!(ExitCode::for_state(&closed), ExitCode::SourceClosed);
        assert_eq!(ExitCode::for_state(&unstable), ExitCode::StreamFailed);
        assert_eq!(ExitCode::for_state(&CaptureSessionState::Idle), ExitCode::Success);
        assert_eq!(ExitCode::SourceClosed.as_i32(), 5);
    }
}
