//! Shared types for window previews.
//!
//! These types cross the boundary between the capture core and the
//! presentation layer, so they are plain data and serializable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangle in screen points (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Size of the rectangle.
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

/// A width/height pair in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Identifies one capturable window.
///
/// The geometry is the window frame at the time the reference was taken.
/// A session never changes its referent; binding a different window
/// requires a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWindowRef {
    /// Platform window ID (CGWindowID on macOS)
    pub window_id: u32,
    /// Process ID of the owning application
    pub pid: i32,
    /// Window frame at capture start
    pub frame: Rect,
}

impl SourceWindowRef {
    pub fn new(window_id: u32, pid: i32, frame: Rect) -> Self {
        Self {
            window_id,
            pid,
            frame,
        }
    }
}

/// Information about a capturable window, as listed to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Platform window ID
    pub window_id: u32,
    /// Process ID of the owning application
    pub pid: i32,
    /// Window title
    pub title: String,
    /// Owning application name
    pub process_name: String,
    /// Window frame (logical coordinates)
    #[serde(default)]
    pub frame: Rect,
}

impl WindowInfo {
    /// Reference used to bind a preview session to this window.
    pub fn source_ref(&self) -> SourceWindowRef {
        SourceWindowRef::new(self.window_id, self.pid, self.frame)
    }
}

/// Focus and title state of the bound source window.
///
/// Recomputed in full on every observer notification and replaced
/// wholesale, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FocusSnapshot {
    pub is_source_window_focused: bool,
    pub is_source_app_focused: bool,
    pub current_title: Option<String>,
}

/// Why a preview session ended up in the `Failed` state.
///
/// Each variant calls for a different user action, so the display strings
/// must stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Permission missing or the stream configuration was rejected
    Configuration { detail: String },
    /// The source window was closed
    SourceClosed,
    /// The platform terminated the stream
    StreamCrashed { detail: String },
    /// Recoverable errors kept recurring past the retry ceiling
    StreamUnstable { attempts: u32 },
}

impl FailureReason {
    /// Short hint on what the user should do next.
    pub fn user_action(&self) -> &'static str {
        match self {
            FailureReason::Configuration { .. } => {
                "check Screen Recording permission and the preview settings"
            }
            FailureReason::SourceClosed => "pick another window to preview",
            FailureReason::StreamCrashed { .. } | FailureReason::StreamUnstable { .. } => {
                "stop and start the preview again"
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Configuration { detail } => {
                write!(f, "permission or configuration problem: {}", detail)
            }
            FailureReason::SourceClosed => write!(f, "source window closed"),
            FailureReason::StreamCrashed { detail } => write!(f, "stream crashed: {}", detail),
            FailureReason::StreamUnstable { attempts } => {
                write!(f, "stream unstable after {} failed attempts", attempts)
            }
        }
    }
}

/// Capture session state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum CaptureSessionState {
    /// No session running
    #[default]
    Idle,
    /// Stream requested, waiting for the first frame
    Starting,
    /// Frames are flowing
    Capturing,
    /// Applying a new stream configuration to the running stream
    Reconfiguring,
    /// Tearing the stream down
    Stopping,
    /// Terminal until an explicit stop followed by start
    Failed(FailureReason),
}

impl CaptureSessionState {
    /// Lowercase name used in logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            CaptureSessionState::Idle => "idle",
            CaptureSessionState::Starting => "starting",
            CaptureSessionState::Capturing => "capturing",
            CaptureSessionState::Reconfiguring => "reconfiguring",
            CaptureSessionState::Stopping => "stopping",
            CaptureSessionState::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CaptureSessionState::Failed(_))
    }
}

impl fmt::Display for CaptureSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSessionState::Failed(reason) => write!(f, "failed ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reasons_are_distinguishable() {
        let config = FailureReason::Configuration {
            detail: "permission denied".to_string(),
        }
        .to_string();
        let closed = FailureReason::SourceClosed.to_string();
        let crashed = FailureReason::StreamCrashed {
            detail: "stopped".to_string(),
        }
        .to_string();
        let unstable = FailureReason::StreamUnstable { attempts: 4 }.to_string();

        assert!(config.contains("permission"));
        assert_eq!(closed, "source window closed");
        assert!(crashed.starts_with("stream crashed"));
        assert!(unstable.starts_with("stream unstable"));
    }

    #[test]
    fn test_state_serialization() {
        let state = CaptureSessionState::Failed(FailureReason::SourceClosed);
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"state":"failed","reason":{"kind":"source_closed"}}"#);

        let parsed: CaptureSessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);

        let idle = serde_json::to_string(&CaptureSessionState::Idle).unwrap();
        assert_eq!(idle, r#"{"state":"idle"}"#);
    }

    #[test]
    fn test_window_info_source_ref() {
        let info = WindowInfo {
            window_id: 42,
            pid: 1234,
            title: "Notes".to_string(),
            process_name: "Notes".to_string(),
            frame: Rect::new(10.0, 20.0, 300.0, 200.0),
        };
        let source = info.source_ref();
        assert_eq!(source.window_id, 42);
        assert_eq!(source.pid, 1234);
        assert_eq!(source.frame.size(), Size { width: 300.0, height: 200.0 });
    }

    #[test]
    fn test_window_info_frame_defaults() {
        let json = r#"{"window_id":1,"pid":2,"title":"t","process_name":"p"}"#;
        let info: WindowInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.frame, Rect::default());
    }
}
