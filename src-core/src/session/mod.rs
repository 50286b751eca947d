//! Capture session coordinator.
//!
//! One coordinator drives one logical preview. Its state machine runs on a
//! single actor task; [`SessionHandle`] is the only way in, and every call
//! is handed off to that task over a channel. State is published through a
//! `watch` channel so consumers always see a status consistent with the
//! transition that produced it.
//!
//! ```text
//!            start                first frame
//!   Idle ───────────► Starting ───────────────► Capturing ◄──┐
//!    ▲                  │  ▲                      │   │       │ done
//!    │ stop             │  └── backoff (retry) ───┘   ▼       │
//!    └── Stopping ◄─────┴──── any ──────────────  Reconfiguring
//!                       │
//!                       ▼ fatal / ceiling reached
//!                     Failed ── stop ──► Idle
//! ```

mod actor;
mod policy;

pub use policy::{classify, ReconfigurePolicy, Recovery, RetryBudget};

use crate::capture::{CaptureBackend, CaptureError, FocusError, StreamConfig, SurfaceFrame, WindowFocuser};
use crate::config::AppConfig;
use crate::observer::SourceObserver;
use glance_types::{CaptureSessionState, FocusSnapshot, SourceWindowRef};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use actor::{Command, SessionActor};

const COMMAND_BUFFER: usize = 32;

/// Errors returned to callers of [`SessionHandle`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("no source window is bound")]
    NoSource,

    #[error("cannot change the source window while the session is {0}")]
    SourceLocked(CaptureSessionState),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Focus(#[from] FocusError),

    #[error("capture session has shut down")]
    Closed,
}

/// Collaborators the coordinator talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub backend: Arc<dyn CaptureBackend>,
    pub observer: Arc<dyn SourceObserver>,
    pub focuser: Arc<dyn WindowFocuser>,
}

/// Coordinator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Frame rate used until `set_frame_rate` is called
    pub frame_rate: f64,
    /// Automatic restarts allowed after consecutive recoverable errors
    pub retry_ceiling: u32,
    /// Delay before each automatic restart
    pub retry_backoff: Duration,
    pub reconfigure_policy: ReconfigurePolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            frame_rate: config.capture.frame_rate,
            retry_ceiling: config.capture.retry_ceiling,
            retry_backoff: Duration::from_millis(config.capture.retry_backoff_ms),
            reconfigure_policy: config.capture.reconfigure_failure,
        }
    }
}

/// Everything a consumer can observe about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub state: CaptureSessionState,
    /// True while frames are expected (`Capturing` or `Reconfiguring`)
    pub is_capturing: bool,
    /// Most recent renderable frame; cleared on stop
    pub last_frame: Option<SurfaceFrame>,
    pub last_error: Option<CaptureError>,
    /// Latest focus/title snapshot of the bound source
    pub focus: FocusSnapshot,
    pub source: Option<SourceWindowRef>,
    /// Configuration of the running stream
    pub stream_config: Option<StreamConfig>,
    /// Frame rate the next (re)configuration will use
    pub frame_rate: f64,
    /// Consecutive failed attempts since the last delivered frame
    pub retry_attempts: u32,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
}

impl SessionStatus {
    pub fn is_source_window_focused(&self) -> bool {
        self.focus.is_source_window_focused
    }

    pub fn is_source_app_focused(&self) -> bool {
        self.focus.is_source_app_focused
    }

    pub fn source_title(&self) -> Option<&str> {
        self.focus.current_title.as_deref()
    }
}

/// Handle to a running coordinator. Cheap to clone.
///
/// The coordinator shuts down, stopping any stream, once every handle is
/// dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Spawn a coordinator on the current tokio runtime.
    pub fn spawn(services: SessionServices, options: SessionOptions) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status) = watch::channel(SessionStatus {
            frame_rate: options.frame_rate,
            ..SessionStatus::default()
        });
        let actor = SessionActor::new(services, options, rx, status_tx);
        tokio::spawn(actor.run());
        Self { commands, status }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Bind the session to `source`. Only allowed while idle.
    pub async fn bind(&self, source: SourceWindowRef) -> Result<(), SessionError> {
        self.request(|reply| Command::Bind { source, reply }).await?
    }

    /// Start capturing the bound source.
    ///
    /// Returns the resulting state. Calling this while a session is already
    /// running (or failed) changes nothing and returns the current state.
    pub async fn start(&self) -> Result<CaptureSessionState, SessionError> {
        self.request(|reply| Command::Start { reply }).await?
    }

    /// Stop capturing. Returns once the platform stream is torn down.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Change the frame rate, reconfiguring the live stream if capturing.
    pub async fn set_frame_rate(&self, fps: f64) -> Result<(), SessionError> {
        self.request(|reply| Command::SetFrameRate { fps, reply }).await?
    }

    /// Ask the focus collaborator to bring the source window forward.
    pub async fn focus_source(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::FocusSource { reply }).await?
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}
