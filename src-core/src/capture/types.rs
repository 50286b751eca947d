//! Runtime types for the frame pipeline.
//!
//! These wrap platform buffers and are not serializable. For types that
//! cross into the presentation layer, see `glance-types`.

use glance_types::{Rect, Size};
use std::fmt;
use std::sync::Arc;

/// A hardware-backed video surface owned by the platform capture subsystem.
///
/// Implementations hold whatever reference the platform hands out with a
/// frame (an IOSurface on macOS). The pipeline never mutates the surface.
pub trait HardwareSurface: Send + Sync + fmt::Debug {
    /// Platform identifier of the surface.
    fn surface_id(&self) -> u32;

    /// Whether the surface still refers to live memory.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Reference to a hardware surface, or the null reference.
///
/// Cloning shares the reference; the surface lives as long as the platform
/// keeps it alive or a consumer still holds a clone.
#[derive(Clone, Default)]
pub struct SurfaceHandle(Option<Arc<dyn HardwareSurface>>);

impl SurfaceHandle {
    pub fn new(surface: Arc<dyn HardwareSurface>) -> Self {
        Self(Some(surface))
    }

    /// The null reference.
    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// True when the handle points at a surface that is still valid.
    pub fn is_valid(&self) -> bool {
        self.0.as_ref().is_some_and(|s| s.is_valid())
    }

    pub fn surface(&self) -> Option<&Arc<dyn HardwareSurface>> {
        self.0.as_ref()
    }

    pub fn surface_id(&self) -> Option<u32> {
        self.0.as_ref().map(|s| s.surface_id())
    }
}

impl fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(surface) => write!(f, "SurfaceHandle({})", surface.surface_id()),
            None => write!(f, "SurfaceHandle(null)"),
        }
    }
}

/// One delivered video frame.
#[derive(Debug, Clone)]
pub struct SurfaceFrame {
    /// Hardware surface with the frame contents
    pub surface: SurfaceHandle,
    /// Region of the surface holding window content (points)
    pub content_rect: Rect,
    /// Scale applied to fit the content into the surface
    pub content_scale: f64,
    /// Backing scale factor of the display the window is on
    pub scale_factor: f64,
    /// Position in the delivery order of its stream, starting at 0
    pub sequence: u64,
}

impl SurfaceFrame {
    /// The "no frame" sentinel.
    pub fn empty() -> Self {
        Self {
            surface: SurfaceHandle::null(),
            content_rect: Rect::default(),
            content_scale: 0.0,
            scale_factor: 0.0,
            sequence: 0,
        }
    }

    /// Whether this frame may be handed to a renderer.
    pub fn is_renderable(&self) -> bool {
        self.surface.is_valid()
    }

    /// Size of the frame content.
    pub fn size(&self) -> Size {
        self.content_rect.size()
    }
}

/// Completion status the platform attaches to a buffer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// New content is available
    Complete,
    /// Nothing changed since the last frame
    Idle,
    /// Blank frame
    Blank,
    /// Stream is suspended (e.g. window minimized)
    Suspended,
    /// First callback after the stream started
    Started,
    /// Last callback before the stream stopped
    Stopped,
}

/// What a platform buffer callback hands to the frame sink.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub surface: SurfaceHandle,
    pub status: FrameStatus,
    pub content_rect: Option<Rect>,
    pub content_scale: Option<f64>,
    pub scale_factor: Option<f64>,
}

impl RawSample {
    /// A complete sample with all metadata present.
    pub fn complete(
        surface: SurfaceHandle,
        content_rect: Rect,
        content_scale: f64,
        scale_factor: f64,
    ) -> Self {
        Self {
            surface,
            status: FrameStatus::Complete,
            content_rect: Some(content_rect),
            content_scale: Some(content_scale),
            scale_factor: Some(scale_factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestSurface {
        id: u32,
        valid: bool,
    }

    impl HardwareSurface for TestSurface {
        fn surface_id(&self) -> u32 {
            self.id
        }

        fn is_valid(&self) -> bool {
            self.valid
        }
    }

    #[test]
    fn test_empty_frame_is_not_renderable() {
        let frame = SurfaceFrame::empty();
        assert!(frame.surface.is_null());
        assert!(!frame.is_renderable());
    }

    #[test]
    fn test_invalid_surface_is_not_renderable() {
        let mut frame = SurfaceFrame::empty();
        frame.surface = SurfaceHandle::new(Arc::new(TestSurface { id: 3, valid: false }));
        assert!(!frame.surface.is_null());
        assert!(!frame.is_renderable());

        frame.surface = SurfaceHandle::new(Arc::new(TestSurface { id: 4, valid: true }));
        assert!(frame.is_renderable());
        assert_eq!(frame.surface.surface_id(), Some(4));
    }

    #[test]
    fn test_frame_size_matches_content_rect() {
        let mut frame = SurfaceFrame::empty();
        frame.content_rect = Rect::new(5.0, 5.0, 640.0, 360.0);
        assert_eq!(frame.size(), frame.content_rect.size());
    }
}
