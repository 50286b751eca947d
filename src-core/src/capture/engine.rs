//! Capture engine.
//!
//! Wraps exactly one platform stream at a time and exposes it as a
//! [`FrameSequence`]. Restart policy is not the engine's business: a
//! stream-level failure ends the sequence with an error and the engine
//! waits to be stopped.

use crate::capture::error::{CaptureError, ReconfigureStage};
use crate::capture::sink::{FrameSequence, FrameSink, FrameStats, FrameStatsSnapshot};
use crate::capture::stream_config::StreamConfig;
use crate::capture::{CaptureBackend, PlatformStream};
use glance_types::SourceWindowRef;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The running stream and everything needed to tear it down.
struct ActiveStream {
    stream: Box<dyn PlatformStream>,
    sink: Arc<FrameSink>,
    source: SourceWindowRef,
    config: StreamConfig,
}

/// Owns the platform capture stream for one preview.
pub struct CaptureEngine {
    backend: Arc<dyn CaptureBackend>,
    active: Option<ActiveStream>,
    stats: Arc<FrameStats>,
}

/// Run a blocking stream operation off the executor, handing the stream back.
///
/// Ownership moves into the blocking task, so no other call can touch the
/// stream while the operation is in flight.
async fn with_stream<T, F>(
    mut stream: Box<dyn PlatformStream>,
    op: F,
) -> Result<(Box<dyn PlatformStream>, Result<T, CaptureError>), CaptureError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn PlatformStream) -> Result<T, CaptureError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = op(stream.as_mut());
        (stream, result)
    })
    .await
    .map_err(|e| CaptureError::StreamFailed(format!("platform stream task failed: {}", e)))
}

impl CaptureEngine {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            active: None,
            stats: Arc::new(FrameStats::default()),
        }
    }

    /// Whether a platform stream is currently held.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Configuration of the running stream.
    pub fn config(&self) -> Option<&StreamConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    /// Cumulative frame counters across all streams of this engine.
    pub fn stats(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start capturing `source`.
    ///
    /// Every failure is reported as the first element of the returned
    /// sequence. Starting an engine that already holds a stream is a caller
    /// bug and fails with [`CaptureError::AlreadyStarted`] without touching
    /// the running stream.
    pub async fn start(&mut self, config: StreamConfig, source: &SourceWindowRef) -> FrameSequence {
        if self.active.is_some() {
            error!(
                window_id = source.window_id,
                "Capture engine start requested while a stream is running"
            );
            return FrameSequence::failed(CaptureError::AlreadyStarted);
        }
        if let Err(e) = config.validate() {
            warn!(window_id = source.window_id, error = %e, "Rejecting stream configuration");
            return FrameSequence::failed(e);
        }
        if !self.backend.source_exists(source) {
            return FrameSequence::failed(CaptureError::SourceGone(source.window_id));
        }

        let (sink, sequence) = FrameSink::channel(config.queue_depth as usize, Arc::clone(&self.stats));

        let stream = match self.backend.open_stream(source, &config, Arc::clone(&sink)) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(window_id = source.window_id, error = %e, "Failed to open capture stream");
                return FrameSequence::failed(e);
            }
        };

        match with_stream(stream, |s| s.start()).await {
            Ok((stream, Ok(()))) => {
                info!(
                    window_id = source.window_id,
                    width = config.width,
                    height = config.height,
                    fps = config.requested_fps,
                    "Capture stream started"
                );
                self.active = Some(ActiveStream {
                    stream,
                    sink,
                    source: source.clone(),
                    config,
                });
                sequence
            }
            Ok((_, Err(e))) | Err(e) => {
                warn!(window_id = source.window_id, error = %e, "Failed to start capture stream");
                sink.close();
                FrameSequence::failed(e)
            }
        }
    }

    /// Stop the running stream.
    ///
    /// Returns after the platform confirms termination; the frame sequence
    /// then ends cleanly. Stopping a stopped engine does nothing.
    pub async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let ActiveStream {
            stream,
            sink,
            source,
            ..
        } = active;

        let result = match with_stream(stream, |s| s.stop()).await {
            Ok((stream, result)) => {
                drop(stream);
                result
            }
            Err(e) => Err(e),
        };
        // Closed only after the platform confirmed, so no callback can
        // deliver into a torn-down session.
        sink.close();

        match &result {
            Ok(()) => info!(window_id = source.window_id, "Capture stream stopped"),
            Err(e) => warn!(window_id = source.window_id, error = %e, "Capture stream stop reported an error"),
        }
        result
    }

    /// Apply `config` to the running stream without ending its sequence.
    ///
    /// Dimensions and frame interval are applied first, then the content
    /// filter. If either step fails the error is returned and the stream is
    /// left as the platform left it; there is no rollback.
    pub async fn reconfigure(&mut self, config: StreamConfig) -> Result<(), CaptureError> {
        config.validate()?;
        let ActiveStream {
            stream,
            sink,
            source,
            config: previous,
        } = self.active.take().ok_or(CaptureError::NotRunning)?;

        let target = source.clone();
        let outcome = with_stream(stream, move |s| {
            s.update_configuration(&config)
                .map_err(|e| CaptureError::reconfigure(ReconfigureStage::Configuration, e))?;
            s.update_content_filter(&target)
                .map_err(|e| CaptureError::reconfigure(ReconfigureStage::ContentFilter, e))
        })
        .await;

        match outcome {
            Ok((stream, result)) => {
                let applied = match &result {
                    Ok(()) => {
                        debug!(
                            window_id = source.window_id,
                            width = config.width,
                            height = config.height,
                            fps = config.requested_fps,
                            "Stream reconfigured"
                        );
                        config
                    }
                    Err(e) => {
                        warn!(
                            window_id = source.window_id,
                            error = %e,
                            "Reconfigure failed; platform stream may be partially updated"
                        );
                        previous
                    }
                };
                self.active = Some(ActiveStream {
                    stream,
                    sink,
                    source,
                    config: applied,
                });
                result
            }
            Err(e) => {
                // The stream went down with its task; end the sequence.
                error!(window_id = source.window_id, error = %e, "Lost capture stream during reconfigure");
                sink.fail(e.clone());
                Err(e)
            }
        }
    }
}
