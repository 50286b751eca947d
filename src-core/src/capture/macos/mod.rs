//! macOS platform capture implementation using ScreenCaptureKit.
//!
//! This module provides window capture on macOS through:
//! - ScreenCaptureKit for hardware-surface frame capture
//! - Core Graphics for window bounds, owner PIDs and stacking order
//! - AppKit for the frontmost application and window activation
//! - TCC for permission handling

mod cg;
pub mod focus;
pub mod stream;
pub mod window_list;

use crate::capture::error::{CaptureError, EnumerationError, FocusError};
use crate::capture::sink::FrameSink;
use crate::capture::stream_config::StreamConfig;
use crate::capture::{CaptureBackend, PlatformStream, WindowEnumerator, WindowFocuser};
use crate::observer::{ProbeResult, WindowProbe};
use glance_types::{SourceWindowRef, WindowInfo};
use std::sync::Arc;

pub use stream::{IoSurface, MacStream};

/// macOS platform capture backend using ScreenCaptureKit.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacOSBackend;

impl MacOSBackend {
    /// Create a new macOS backend.
    pub fn new() -> Self {
        Self
    }

    /// Check if screen recording permission is granted.
    pub fn has_screen_recording_permission() -> bool {
        unsafe { CGPreflightScreenCaptureAccess() }
    }

    /// Request screen recording permission from the user.
    ///
    /// This will show the system permission prompt if permission hasn't been determined yet.
    /// Returns true if permission is granted, false otherwise.
    pub fn request_screen_recording_permission() -> bool {
        unsafe { CGRequestScreenCaptureAccess() }
    }

    /// Check and request permission, returning an error if not granted.
    fn ensure_permission() -> Result<(), CaptureError> {
        if !Self::has_screen_recording_permission()
            && !Self::request_screen_recording_permission()
        {
            return Err(CaptureError::PermissionDenied(
                "grant access in System Settings > Privacy & Security > Screen Recording, then restart the app".to_string(),
            ));
        }
        Ok(())
    }
}

impl WindowEnumerator for MacOSBackend {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, EnumerationError> {
        window_list::list_windows()
    }
}

impl CaptureBackend for MacOSBackend {
    fn source_exists(&self, source: &SourceWindowRef) -> bool {
        cg::window(source.window_id).is_some()
    }

    fn open_stream(
        &self,
        source: &SourceWindowRef,
        config: &StreamConfig,
        sink: Arc<FrameSink>,
    ) -> Result<Box<dyn PlatformStream>, CaptureError> {
        Self::ensure_permission()?;
        Ok(Box::new(MacStream::open(source, config, sink)?))
    }
}

impl WindowFocuser for MacOSBackend {
    fn focus(&self, source: &SourceWindowRef) -> Result<(), FocusError> {
        focus::focus(source)
    }
}

impl WindowProbe for MacOSBackend {
    fn probe(&self, source: &SourceWindowRef) -> ProbeResult {
        focus::probe(source)
    }
}

// External declarations for Core Graphics permission functions
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
    fn CGRequestScreenCaptureAccess() -> bool;
}
