//! Window capture.
//!
//! Platform-agnostic seams for capturing a window as a stream of hardware
//! surfaces, with the platform implementation selected at compile time.

pub mod engine;
pub mod error;
pub mod sink;
pub mod stream_config;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

// Platform-specific modules
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(not(target_os = "macos"))]
pub mod unsupported;

pub use engine::CaptureEngine;
pub use error::{CaptureError, EnumerationError, ErrorSeverity, FocusError, ReconfigureStage};
pub use sink::{FrameSequence, FrameSink, FrameStats, FrameStatsSnapshot};
pub use stream_config::{FrameInterval, StreamConfig, MAX_FRAME_RATE, QUEUE_DEPTH};
pub use types::{FrameStatus, HardwareSurface, RawSample, SurfaceFrame, SurfaceHandle};

use glance_types::{SourceWindowRef, WindowInfo};
use std::sync::Arc;

// Platform-specific backend aliases
#[cfg(target_os = "macos")]
pub use macos::MacOSBackend as PlatformBackend;
#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedBackend as PlatformBackend;

/// One platform capture stream.
///
/// Calls may block while the platform (de)initializes; the engine runs them
/// off the async executor. Only the engine holds a stream, so calls never
/// overlap.
pub trait PlatformStream: Send + 'static {
    /// Begin delivering buffers to the sink the stream was opened with.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Apply new dimensions / frame interval to the running stream.
    fn update_configuration(&mut self, config: &StreamConfig) -> Result<(), CaptureError>;

    /// Re-apply the content filter for the capture target.
    fn update_content_filter(&mut self, source: &SourceWindowRef) -> Result<(), CaptureError>;

    /// Stop the stream, returning once the platform confirms no further
    /// callbacks will fire.
    fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Trait for capture operations.
pub trait CaptureBackend: Send + Sync {
    /// Whether the source window still exists.
    fn source_exists(&self, source: &SourceWindowRef) -> bool;

    /// Create a stream for `source` delivering raw buffers to `sink`.
    ///
    /// The stream is not started.
    fn open_stream(
        &self,
        source: &SourceWindowRef,
        config: &StreamConfig,
        sink: Arc<FrameSink>,
    ) -> Result<Box<dyn PlatformStream>, CaptureError>;
}

/// Trait for window enumeration operations.
pub trait WindowEnumerator: Send + Sync {
    /// List all visible, capturable windows.
    fn list_windows(&self) -> Result<Vec<WindowInfo>, EnumerationError>;

    /// Current reference for a window ID, if the window is capturable.
    fn resolve(&self, window_id: u32) -> Result<Option<SourceWindowRef>, EnumerationError> {
        Ok(self
            .list_windows()?
            .into_iter()
            .find(|w| w.window_id == window_id)
            .map(|w| w.source_ref()))
    }
}

/// Brings a source window to the front.
pub trait WindowFocuser: Send + Sync {
    fn focus(&self, source: &SourceWindowRef) -> Result<(), FocusError>;
}

/// Get the platform-specific capture backend.
pub fn get_backend() -> PlatformBackend {
    PlatformBackend::new()
}

/// List all visible, capturable windows.
pub fn list_windows() -> Result<Vec<WindowInfo>, EnumerationError> {
    get_backend().list_windows()
}
