//! Error types for capture operations.

use std::fmt;
use thiserror::Error;

/// Error type for capture operations.
///
/// Cloneable so the session can republish the last error to observers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    /// Zero/invalid dimensions or an unsupported frame rate
    #[error("invalid stream configuration: {0}")]
    InvalidConfiguration(String),
    /// Screen recording permission has not been granted
    #[error("screen recording permission denied: {0}")]
    PermissionDenied(String),
    /// Window capture is not available on this platform
    #[error("window capture is not supported on this platform")]
    Unsupported,
    /// The source window no longer exists
    #[error("source window {0} no longer exists")]
    SourceGone(u32),
    /// The content filter/target could not be resolved right now
    #[error("capture target unavailable: {0}")]
    TargetUnavailable(String),
    /// The stream hiccupped but the source is still there
    #[error("capture stream interrupted: {0}")]
    StreamInterrupted(String),
    /// The platform terminated the stream for good
    #[error("capture stream failed: {0}")]
    StreamFailed(String),
    /// A live reconfigure was only partially applied
    #[error("reconfigure failed while applying {stage}: {reason}")]
    Reconfigure {
        stage: ReconfigureStage,
        reason: String,
    },
    /// `start` called on an engine that is already running
    #[error("capture engine already started")]
    AlreadyStarted,
    /// Operation needs a running stream
    #[error("capture engine is not running")]
    NotRunning,
}

/// Which half of a live reconfigure failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigureStage {
    /// Dimensions and frame interval
    Configuration,
    /// Content filter / capture target
    ContentFilter,
}

impl fmt::Display for ReconfigureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconfigureStage::Configuration => write!(f, "stream configuration"),
            ReconfigureStage::ContentFilter => write!(f, "content filter"),
        }
    }
}

/// Error taxonomy used by the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Rejected before any platform call; user must fix settings or permission
    Configuration,
    /// Worth retrying after a short backoff
    Recoverable,
    /// Stream is gone for good; explicit restart required
    Fatal,
    /// Live reconfigure failed; previous configuration stays authoritative
    Reconfigure,
}

impl CaptureError {
    /// Classify this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CaptureError::InvalidConfiguration(_)
            | CaptureError::PermissionDenied(_)
            | CaptureError::Unsupported => ErrorSeverity::Configuration,
            CaptureError::TargetUnavailable(_) | CaptureError::StreamInterrupted(_) => {
                ErrorSeverity::Recoverable
            }
            CaptureError::SourceGone(_)
            | CaptureError::StreamFailed(_)
            | CaptureError::AlreadyStarted
            | CaptureError::NotRunning => ErrorSeverity::Fatal,
            CaptureError::Reconfigure { .. } => ErrorSeverity::Reconfigure,
        }
    }

    pub(crate) fn reconfigure(stage: ReconfigureStage, cause: CaptureError) -> Self {
        match cause {
            // Already wrapped by the platform layer
            CaptureError::Reconfigure { .. } => cause,
            other => CaptureError::Reconfigure {
                stage,
                reason: other.to_string(),
            },
        }
    }
}

/// Error type for window enumeration.
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// Platform-specific enumeration error
    #[error("enumeration error: {0}")]
    PlatformError(String),
    /// Feature not implemented on this platform
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Error type for the window focus collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FocusError {
    /// The owning application is no longer running
    #[error("application with pid {0} is not running")]
    ApplicationNotRunning(i32),
    /// The platform refused to activate the application
    #[error("failed to focus window: {0}")]
    ActivationFailed(String),
    /// Focusing windows is not available on this platform
    #[error("focusing windows is not supported on this platform")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_taxonomy() {
        assert_eq!(
            CaptureError::InvalidConfiguration("0x0".into()).severity(),
            ErrorSeverity::Configuration
        );
        assert_eq!(
            CaptureError::PermissionDenied("tcc".into()).severity(),
            ErrorSeverity::Configuration
        );
        assert_eq!(
            CaptureError::StreamInterrupted("hiccup".into()).severity(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(
            CaptureError::TargetUnavailable("filter".into()).severity(),
            ErrorSeverity::Recoverable
        );
        assert_eq!(CaptureError::SourceGone(7).severity(), ErrorSeverity::Fatal);
        assert_eq!(
            CaptureError::StreamFailed("stopped".into()).severity(),
            ErrorSeverity::Fatal
        );
    }

    #[test]
    fn test_reconfigure_wrapping_keeps_first_stage() {
        let inner = CaptureError::Reconfigure {
            stage: ReconfigureStage::ContentFilter,
            reason: "window moved".into(),
        };
        let wrapped = CaptureError::reconfigure(ReconfigureStage::Configuration, inner.clone());
        assert_eq!(wrapped, inner);

        let wrapped = CaptureError::reconfigure(
            ReconfigureStage::Configuration,
            CaptureError::TargetUnavailable("busy".into()),
        );
        assert_eq!(wrapped.severity(), ErrorSeverity::Reconfigure);
        assert!(wrapped.to_string().contains("stream configuration"));
    }
}
