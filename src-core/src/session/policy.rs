//! Failure classification and retry bookkeeping for capture sessions.

use crate::capture::{CaptureError, ErrorSeverity};
use glance_types::FailureReason;
use serde::{Deserialize, Serialize};

/// What to do when a live reconfigure fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconfigurePolicy {
    /// Keep the running stream with its previous configuration
    #[default]
    KeepPrevious,
    /// Tear the stream down and start a new one with the new configuration
    Restart,
}

impl ReconfigurePolicy {
    /// Convert from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "keep_previous" => Some(Self::KeepPrevious),
            "restart" => Some(Self::Restart),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepPrevious => "keep_previous",
            Self::Restart => "restart",
        }
    }
}

/// Outcome of classifying a terminal stream error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Wait for the backoff and start again
    Retry,
    /// Give up; the session moves to `Failed`
    Fail(FailureReason),
}

/// Decide whether a stream that ended with `error` is worth restarting.
///
/// `source_exists` is the latest existence signal for the bound window. A
/// recoverable error against a window that is gone is not retried.
pub fn classify(error: &CaptureError, source_exists: bool) -> Recovery {
    match error.severity() {
        ErrorSeverity::Configuration => Recovery::Fail(FailureReason::Configuration {
            detail: error.to_string(),
        }),
        ErrorSeverity::Fatal => match error {
            CaptureError::SourceGone(_) => Recovery::Fail(FailureReason::SourceClosed),
            other => Recovery::Fail(FailureReason::StreamCrashed {
                detail: other.to_string(),
            }),
        },
        ErrorSeverity::Recoverable | ErrorSeverity::Reconfigure => {
            if source_exists {
                Recovery::Retry
            } else {
                Recovery::Fail(FailureReason::SourceClosed)
            }
        }
    }
}

/// Counts consecutive failed attempts against a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    ceiling: u32,
    failures: u32,
}

impl RetryBudget {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            failures: 0,
        }
    }

    /// Record a failure. Returns `true` if another attempt is allowed.
    pub fn record_failure(&mut self) -> bool {
        self.failures = self.failures.saturating_add(1);
        self.failures <= self.ceiling
    }

    /// A frame got through; the stream is healthy again.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ReconfigureStage;

    #[test]
    fn test_configuration_errors_fail_without_retry() {
        for error in [
            CaptureError::InvalidConfiguration("0x0".into()),
            CaptureError::PermissionDenied("denied".into()),
            CaptureError::Unsupported,
        ] {
            assert!(matches!(
                classify(&error, true),
                Recovery::Fail(FailureReason::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_fatal_errors_distinguish_closed_from_crashed() {
        assert_eq!(
            classify(&CaptureError::SourceGone(3), true),
            Recovery::Fail(FailureReason::SourceClosed)
        );
        assert!(matches!(
            classify(&CaptureError::StreamFailed("gpu reset".into()), true),
            Recovery::Fail(FailureReason::StreamCrashed { .. })
        ));
    }

    #[test]
    fn test_recoverable_errors_retry_only_while_source_exists() {
        let error = CaptureError::StreamInterrupted("hiccup".into());
        assert_eq!(classify(&error, true), Recovery::Retry);
        assert_eq!(
            classify(&error, false),
            Recovery::Fail(FailureReason::SourceClosed)
        );

        let partial = CaptureError::Reconfigure {
            stage: ReconfigureStage::ContentFilter,
            reason: "filter".into(),
        };
        assert_eq!(classify(&partial, true), Recovery::Retry);
    }

    #[test]
    fn test_retry_budget_ceiling() {
        let mut budget = RetryBudget::new(3);
        assert!(budget.record_failure());
        assert!(budget.record_failure());
        assert!(budget.record_failure());
        assert!(!budget.record_failure());
        assert_eq!(budget.failures(), 4);

        budget.reset();
        assert_eq!(budget.failures(), 0);
        assert!(budget.record_failure());
    }

    #[test]
    fn test_zero_ceiling_never_retries() {
        let mut budget = RetryBudget::new(0);
        assert!(!budget.record_failure());
    }

    #[test]
    fn test_reconfigure_policy_strings() {
        assert_eq!(
            ReconfigurePolicy::from_str("keep-previous"),
            Some(ReconfigurePolicy::KeepPrevious)
        );
        assert_eq!(ReconfigurePolicy::from_str("RESTART"), Some(ReconfigurePolicy::Restart));
        assert_eq!(ReconfigurePolicy::from_str("sometimes"), None);
        assert_eq!(ReconfigurePolicy::default().as_str(), "keep_previous");
        assert_eq!(
            serde_json::to_string(&ReconfigurePolicy::Restart).unwrap(),
            "\"restart\""
        );
    }
}
