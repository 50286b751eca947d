//! Stream configuration builder.
//!
//! Derives capture parameters for a source window and a frame-rate
//! preference. Configurations are values: a change produces a new one.

use crate::capture::error::CaptureError;
use glance_types::SourceWindowRef;
use std::time::Duration;

/// Number of in-flight buffers the platform may hold for one stream.
///
/// Three is the smallest depth that avoids visible stutter in previews.
pub const QUEUE_DEPTH: u32 = 3;

/// Highest frame rate a preview may request.
pub const MAX_FRAME_RATE: f64 = 120.0;

/// Rational time value (`value / timescale` seconds), as used by CMTime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval {
    pub value: i64,
    pub timescale: i32,
}

impl FrameInterval {
    /// Interval between frames at `fps` frames per second.
    ///
    /// Whole rates are exact (`1/fps`); fractional rates are represented
    /// with millisecond precision on the rate (e.g. 29.97 → 1000/29970).
    pub fn from_fps(fps: f64) -> Self {
        if fps >= 1.0 && fps.fract() == 0.0 && fps <= i32::MAX as f64 {
            return Self {
                value: 1,
                timescale: fps as i32,
            };
        }
        let timescale = (fps * 1000.0).round() as i32;
        Self {
            value: 1000,
            timescale: timescale.max(1),
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.as_secs_f64().max(0.0))
    }
}

/// Parameters for one capture stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Minimum time between delivered frames
    pub minimum_frame_interval: FrameInterval,
    /// Maximum number of buffers in flight
    pub queue_depth: u32,
    /// Whether the cursor is drawn into frames (always off for previews)
    pub shows_cursor: bool,
    /// Frame rate the interval was derived from
    pub requested_fps: f64,
}

impl StreamConfig {
    /// Build the configuration for capturing `source` at `requested_fps`.
    ///
    /// Dimensions are the source frame truncated to whole pixels, never
    /// scaled up. This never fails: a zero-sized window produces a
    /// zero-sized configuration, which the engine rejects at start.
    pub fn build(source: &SourceWindowRef, requested_fps: f64) -> Self {
        Self {
            width: source.frame.width.trunc() as u32,
            height: source.frame.height.trunc() as u32,
            minimum_frame_interval: FrameInterval::from_fps(requested_fps),
            queue_depth: QUEUE_DEPTH,
            shows_cursor: false,
            requested_fps,
        }
    }

    /// Check that the platform could be asked for this configuration.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidConfiguration(format!(
                "source window has zero size ({}x{})",
                self.width, self.height
            )));
        }
        validate_frame_rate(self.requested_fps)?;
        if self.queue_depth == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "queue depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check a frame-rate preference.
pub fn validate_frame_rate(fps: f64) -> Result<(), CaptureError> {
    if !fps.is_finite() || fps <= 0.0 || fps > MAX_FRAME_RATE {
        return Err(CaptureError::InvalidConfiguration(format!(
            "unsupported frame rate {} (expected 0 < fps <= {})",
            fps, MAX_FRAME_RATE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glance_types::Rect;

    fn source(width: f64, height: f64) -> SourceWindowRef {
        SourceWindowRef::new(1, 100, Rect::new(0.0, 0.0, width, height))
    }

    #[test]
    fn test_build_uses_source_size() {
        let config = StreamConfig::build(&source(300.0, 200.0), 30.0);
        assert_eq!(config.width, 300);
        assert_eq!(config.height, 200);
        assert_eq!(
            config.minimum_frame_interval,
            FrameInterval {
                value: 1,
                timescale: 30
            }
        );
        assert_eq!(config.queue_depth, QUEUE_DEPTH);
        assert!(!config.shows_cursor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_build_truncates_fractional_size() {
        let config = StreamConfig::build(&source(300.9, 199.5), 10.0);
        assert_eq!(config.width, 300);
        assert_eq!(config.height, 199);
    }

    #[test]
    fn test_interval_matches_requested_rate() {
        for fps in [1.0, 5.0, 10.0, 15.0, 24.0, 29.97, 30.0, 59.94, 60.0, 120.0, 0.5] {
            let config = StreamConfig::build(&source(640.0, 480.0), fps);
            let interval = config.minimum_frame_interval.as_secs_f64();
            assert!(
                (interval - 1.0 / fps).abs() < 1e-6,
                "fps {} gave interval {}",
                fps,
                interval
            );
        }
    }

    #[test]
    fn test_zero_sized_source_builds_but_fails_validation() {
        let config = StreamConfig::build(&source(0.0, 200.0), 30.0);
        assert_eq!(config.width, 0);
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfiguration(_))
        ));

        // Negative sizes saturate to zero
        let config = StreamConfig::build(&source(-10.0, 20.0), 30.0);
        assert_eq!(config.width, 0);
    }

    #[test]
    fn test_frame_rate_validation() {
        assert!(validate_frame_rate(30.0).is_ok());
        assert!(validate_frame_rate(MAX_FRAME_RATE).is_ok());
        assert!(validate_frame_rate(0.0).is_err());
        assert!(validate_frame_rate(-5.0).is_err());
        assert!(validate_frame_rate(f64::NAN).is_err());
        assert!(validate_frame_rate(f64::INFINITY).is_err());
        assert!(validate_frame_rate(MAX_FRAME_RATE + 1.0).is_err());
    }
}
