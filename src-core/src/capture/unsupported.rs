//! Fallback backend for platforms without window capture.
//!
//! Keeps the session logic buildable everywhere; every operation reports
//! that capture is unavailable.

use crate::capture::error::{CaptureError, EnumerationError, FocusError};
use crate::capture::sink::FrameSink;
use crate::capture::stream_config::StreamConfig;
use crate::capture::{CaptureBackend, PlatformStream, WindowEnumerator, WindowFocuser};
use crate::observer::{ProbeResult, WindowProbe};
use glance_types::{SourceWindowRef, WindowInfo};
use std::sync::Arc;

/// Backend used on platforms other than macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for UnsupportedBackend {
    fn source_exists(&self, _source: &SourceWindowRef) -> bool {
        false
    }

    fn open_stream(
        &self,
        _source: &SourceWindowRef,
        _config: &StreamConfig,
        _sink: Arc<FrameSink>,
    ) -> Result<Box<dyn PlatformStream>, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

impl WindowEnumerator for UnsupportedBackend {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, EnumerationError> {
        Err(EnumerationError::NotImplemented(
            "window enumeration requires macOS".to_string(),
        ))
    }
}

impl WindowFocuser for UnsupportedBackend {
    fn focus(&self, _source: &SourceWindowRef) -> Result<(), FocusError> {
        Err(FocusError::Unsupported)
    }
}

impl WindowProbe for UnsupportedBackend {
    fn probe(&self, _source: &SourceWindowRef) -> ProbeResult {
        ProbeResult::Gone
    }
}
