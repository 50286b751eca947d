//! ScreenCaptureKit capture stream.
//!
//! Buffers arrive on ScreenCaptureKit's own dispatch queue and go straight
//! into the [`FrameSink`]; nothing here touches the async runtime.
//!
//! Live reconfiguration happens in the two steps the engine asks for. The
//! configuration step records the new parameters; the content-filter step
//! re-resolves the window and replaces the underlying `SCStream` with one
//! built from the current filter and parameters, delivering into the same
//! sink. The frame sequence never ends across a reconfigure.

use super::cg;
use crate::capture::error::CaptureError;
use crate::capture::sink::FrameSink;
use crate::capture::stream_config::StreamConfig;
use crate::capture::types::{FrameStatus, HardwareSurface, RawSample, SurfaceHandle};
use crate::capture::PlatformStream;
use core_foundation::array::CFArrayRef;
use core_foundation::base::{CFRelease, CFRetain};
use core_foundation::dictionary::CFDictionaryRef;
use glance_types::SourceWindowRef;
use screencapturekit::{
    cm_sample_buffer::CMSampleBuffer,
    sc_content_filter::{InitParams, SCContentFilter},
    sc_error_handler::StreamErrorHandler,
    sc_output_handler::{SCStreamOutputType, StreamOutput},
    sc_shareable_content::SCShareableContent,
    sc_stream::SCStream,
    sc_stream_configuration::{PixelFormat, SCStreamConfiguration},
};
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[link(name = "CoreMedia", kind = "framework")]
extern "C" {
    fn CMSampleBufferGetSampleAttachmentsArray(
        sbuf: *const c_void,
        create_if_necessary: u8,
    ) -> CFArrayRef;
}

#[link(name = "CoreVideo", kind = "framework")]
extern "C" {
    fn CVPixelBufferGetIOSurface(pixel_buffer: *const c_void) -> *const c_void;
}

#[link(name = "IOSurface", kind = "framework")]
extern "C" {
    fn IOSurfaceGetID(surface: *const c_void) -> u32;
}

extern "C" {
    fn CFArrayGetValueAtIndex(theArray: CFArrayRef, idx: isize) -> *const c_void;
    fn CFArrayGetCount(theArray: CFArrayRef) -> isize;
}

// SCStreamFrameInfo attachment keys
const FRAME_INFO_STATUS: &str = "SCStreamUpdateFrameStatus";
const FRAME_INFO_CONTENT_RECT: &str = "SCStreamUpdateFrameContentRect";
const FRAME_INFO_CONTENT_SCALE: &str = "SCStreamUpdateFrameContentScale";
const FRAME_INFO_SCALE_FACTOR: &str = "SCStreamUpdateFrameScaleFactor";

/// Retained IOSurface backing one frame.
pub struct IoSurface {
    surface: *const c_void,
    id: u32,
}

// IOSurfaceRef is a thread-safe CF type; this wrapper only retains/releases it.
unsafe impl Send for IoSurface {}
unsafe impl Sync for IoSurface {}

impl IoSurface {
    /// Retain the IOSurface behind a CVPixelBuffer, if it has one.
    ///
    /// # Safety
    /// `pixel_buffer` must be a valid CVPixelBufferRef for the duration of
    /// the call.
    unsafe fn from_pixel_buffer(pixel_buffer: *const c_void) -> Option<Self> {
        if pixel_buffer.is_null() {
            return None;
        }
        let surface = CVPixelBufferGetIOSurface(pixel_buffer);
        if surface.is_null() {
            return None;
        }
        CFRetain(surface);
        Some(Self {
            surface,
            id: IOSurfaceGetID(surface),
        })
    }

    /// Raw `IOSurfaceRef` for handing to a renderer.
    pub fn as_ptr(&self) -> *const c_void {
        self.surface
    }
}

impl Drop for IoSurface {
    fn drop(&mut self) {
        unsafe { CFRelease(self.surface) };
    }
}

impl fmt::Debug for IoSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IoSurface({})", self.id)
    }
}

impl HardwareSurface for IoSurface {
    fn surface_id(&self) -> u32 {
        self.id
    }

    fn is_valid(&self) -> bool {
        !self.surface.is_null()
    }
}

fn frame_status(raw: i64) -> FrameStatus {
    match raw {
        0 => FrameStatus::Complete,
        1 => FrameStatus::Idle,
        2 => FrameStatus::Blank,
        3 => FrameStatus::Suspended,
        4 => FrameStatus::Started,
        _ => FrameStatus::Stopped,
    }
}

/// Read status and geometry from the sample's SCStreamFrameInfo attachments.
///
/// # Safety
/// `sample_buffer` must be a valid CMSampleBufferRef.
unsafe fn read_frame_info(sample_buffer: *const c_void, surface: SurfaceHandle) -> RawSample {
    let mut sample = RawSample {
        surface,
        status: FrameStatus::Stopped,
        content_rect: None,
        content_scale: None,
        scale_factor: None,
    };

    let attachments = CMSampleBufferGetSampleAttachmentsArray(sample_buffer, 0);
    if attachments.is_null() || CFArrayGetCount(attachments) < 1 {
        return sample;
    }
    let info = CFArrayGetValueAtIndex(attachments, 0) as CFDictionaryRef;
    if info.is_null() {
        return sample;
    }

    if let Some(status) = cg::number_value(info, FRAME_INFO_STATUS) {
        sample.status = frame_status(status as i64);
    }
    sample.content_rect = cg::dict_value(info, FRAME_INFO_CONTENT_RECT)
        .and_then(|rect| cg::rect_value(rect as CFDictionaryRef));
    sample.content_scale = cg::number_value(info, FRAME_INFO_CONTENT_SCALE);
    sample.scale_factor = cg::number_value(info, FRAME_INFO_SCALE_FACTOR);
    sample
}

/// Reports stream errors into the sink, ending the frame sequence.
struct SinkErrorHandler {
    sink: Arc<FrameSink>,
    window_id: u32,
}

impl StreamErrorHandler for SinkErrorHandler {
    fn on_error(&self) {
        warn!(window_id = self.window_id, "ScreenCaptureKit stream error");
        self.sink
            .platform_stopped("ScreenCaptureKit stopped the stream");
    }
}

/// Turns sample buffers into raw samples for the sink.
struct SinkOutputHandler {
    sink: Arc<FrameSink>,
}

impl StreamOutput for SinkOutputHandler {
    fn did_output_sample_buffer(&self, sample: CMSampleBuffer, of_type: SCStreamOutputType) {
        // Only handle screen output
        if !matches!(of_type, SCStreamOutputType::Screen) {
            return;
        }

        // CVImageBufferRef and CVPixelBufferRef are toll-free bridged
        let pixel_buffer: *const c_void = sample
            .image_buf_ref
            .as_ref()
            .map(|img_buf| {
                let inner_ref = &**img_buf;
                inner_ref as *const _ as *const c_void
            })
            .unwrap_or(std::ptr::null());
        let surface = unsafe { IoSurface::from_pixel_buffer(pixel_buffer) }
            .map(|s| SurfaceHandle::new(Arc::new(s)))
            .unwrap_or_else(SurfaceHandle::null);

        let sample_buffer = &*sample.sys_ref as *const _ as *const c_void;
        let raw = unsafe { read_frame_info(sample_buffer, surface) };
        self.sink.push(raw);
    }
}

fn stream_configuration(config: &StreamConfig) -> SCStreamConfiguration {
    SCStreamConfiguration {
        width: config.width,
        height: config.height,
        shows_cursor: config.shows_cursor,
        pixel_format: PixelFormat::ARGB8888, // BGRA in memory
        minimum_frame_interval: screencapturekit::sc_types::base::CMTime {
            value: config.minimum_frame_interval.value,
            timescale: config.minimum_frame_interval.timescale,
            flags: 1,
            epoch: 0,
        },
        queue_depth: config.queue_depth,
        ..Default::default()
    }
}

/// Resolve `window_id` to a desktop-independent window filter.
fn content_filter(window_id: u32) -> Result<SCContentFilter, CaptureError> {
    let content = SCShareableContent::try_current()
        .map_err(|e| CaptureError::TargetUnavailable(format!("shareable content: {}", e)))?;

    let window_index = content
        .windows
        .iter()
        .position(|w| w.window_id == window_id)
        .ok_or(CaptureError::SourceGone(window_id))?;

    // Take ownership of the window for the filter
    let mut content = content;
    let window = content.windows.swap_remove(window_index);
    Ok(SCContentFilter::new(InitParams::DesktopIndependentWindow(
        window,
    )))
}

/// One preview's ScreenCaptureKit stream.
pub struct MacStream {
    window_id: u32,
    config: StreamConfig,
    sink: Arc<FrameSink>,
    stream: Option<SCStream>,
    running: bool,
}

impl MacStream {
    pub fn open(
        source: &SourceWindowRef,
        config: &StreamConfig,
        sink: Arc<FrameSink>,
    ) -> Result<Self, CaptureError> {
        let mut stream = Self {
            window_id: source.window_id,
            config: *config,
            sink,
            stream: None,
            running: false,
        };
        stream.stream = Some(stream.build(content_filter(source.window_id)?));
        Ok(stream)
    }

    fn build(&self, filter: SCContentFilter) -> SCStream {
        let handler = SinkErrorHandler {
            sink: Arc::clone(&self.sink),
            window_id: self.window_id,
        };
        let mut stream = SCStream::new(filter, stream_configuration(&self.config), handler);
        stream.add_output(
            SinkOutputHandler {
                sink: Arc::clone(&self.sink),
            },
            SCStreamOutputType::Screen,
        );
        stream
    }

    fn start_current(&mut self) -> Result<(), CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::NotRunning)?;
        stream
            .start_capture()
            .map_err(|e| CaptureError::TargetUnavailable(format!("failed to start capture: {}", e)))?;
        self.running = true;
        Ok(())
    }

    fn stop_current(&mut self) -> Result<(), CaptureError> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        match self.stream.as_mut() {
            Some(stream) => stream
                .stop_capture()
                .map_err(|e| CaptureError::StreamFailed(format!("failed to stop capture: {}", e))),
            None => Ok(()),
        }
    }
}

impl PlatformStream for MacStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        self.start_current()?;
        info!(window_id = self.window_id, "ScreenCaptureKit stream started");
        Ok(())
    }

    fn update_configuration(&mut self, config: &StreamConfig) -> Result<(), CaptureError> {
        config.validate()?;
        self.config = *config;
        debug!(
            window_id = self.window_id,
            width = config.width,
            height = config.height,
            "Stream configuration staged"
        );
        Ok(())
    }

    fn update_content_filter(&mut self, source: &SourceWindowRef) -> Result<(), CaptureError> {
        let filter = content_filter(source.window_id)?;
        let replacement = self.build(filter);
        let was_running = self.running;

        if let Err(e) = self.stop_current() {
            // Nothing is known to be delivering into the sink any more
            error!(window_id = self.window_id, error = %e, "Stream lost during filter swap");
            self.sink
                .platform_stopped(format!("stream lost during content filter swap: {}", e));
            return Err(e);
        }
        let previous = self.stream.replace(replacement);
        if !was_running {
            return Ok(());
        }

        if let Err(e) = self.start_current() {
            // Bring the old stream back so the preview keeps running
            warn!(window_id = self.window_id, error = %e, "Replacement stream failed to start");
            self.stream = previous;
            if let Err(restart) = self.start_current() {
                error!(
                    window_id = self.window_id,
                    error = %restart,
                    "Previous stream failed to restart"
                );
                self.sink.platform_stopped(format!(
                    "no stream running after content filter swap: {}",
                    restart
                ));
            }
            return Err(e);
        }
        debug!(window_id = self.window_id, "Content filter reapplied");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.stop_current()?;
        info!(window_id = self.window_id, "ScreenCaptureKit stream stopped");
        Ok(())
    }
}

impl Drop for MacStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop_current() {
            debug!(window_id = self.window_id, error = %e, "Stream stop on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::stream_config::FrameInterval;
    use glance_types::Rect;

    #[test]
    fn test_frame_status_mapping() {
        assert_eq!(frame_status(0), FrameStatus::Complete);
        assert_eq!(frame_status(1), FrameStatus::Idle);
        assert_eq!(frame_status(3), FrameStatus::Suspended);
        assert_eq!(frame_status(42), FrameStatus::Stopped);
    }

    #[test]
    fn test_stream_configuration_mirrors_config() {
        let source = SourceWindowRef::new(1, 1, Rect::new(0.0, 0.0, 300.0, 200.0));
        let config = StreamConfig::build(&source, 30.0);
        let sc = stream_configuration(&config);

        assert_eq!(sc.width, 300);
        assert_eq!(sc.height, 200);
        assert!(!sc.shows_cursor);
        assert_eq!(sc.queue_depth, 3);
        assert_eq!(sc.minimum_frame_interval.value, FrameInterval::from_fps(30.0).value);
        assert_eq!(sc.minimum_frame_interval.timescale, 30);
    }
}
