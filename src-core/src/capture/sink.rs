//! Frame sink and frame sequence.
//!
//! The sink runs on the platform's dedicated callback context. It validates
//! each raw buffer, wraps it in a [`SurfaceFrame`] and pushes it into a
//! bounded channel sized to the stream's queue depth. The consumer side of
//! that channel is the [`FrameSequence`].
//!
//! ```text
//! platform callback queue ──► FrameSink::push ──► mpsc (depth 3) ──► FrameSequence
//! ```
//!
//! When the channel is full the frame is dropped; previews tolerate dropped
//! frames, never a stalled capture callback.

use crate::capture::error::CaptureError;
use crate::capture::types::{FrameStatus, RawSample, SurfaceFrame};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cumulative frame counters for one engine.
#[derive(Debug, Default)]
pub struct FrameStats {
    delivered: AtomicU64,
    dropped_incomplete: AtomicU64,
    dropped_invalid_surface: AtomicU64,
    dropped_missing_metadata: AtomicU64,
    dropped_backpressure: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStatsSnapshot {
    /// Frames handed to the sequence
    pub delivered: u64,
    /// Buffers whose status was not `Complete`
    pub dropped_incomplete: u64,
    /// Buffers with a null or invalid surface
    pub dropped_invalid_surface: u64,
    /// Buffers lacking content rect or scale metadata
    pub dropped_missing_metadata: u64,
    /// Frames dropped because the queue was full
    pub dropped_backpressure: u64,
}

impl FrameStatsSnapshot {
    /// Total frames that never reached the consumer.
    pub fn dropped(&self) -> u64 {
        self.dropped_incomplete
            + self.dropped_invalid_surface
            + self.dropped_missing_metadata
            + self.dropped_backpressure
    }
}

impl FrameStats {
    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_incomplete: self.dropped_incomplete.load(Ordering::Relaxed),
            dropped_invalid_surface: self.dropped_invalid_surface.load(Ordering::Relaxed),
            dropped_missing_metadata: self.dropped_missing_metadata.load(Ordering::Relaxed),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Relaxed),
        }
    }
}

/// Receives raw buffer callbacks for one stream.
pub struct FrameSink {
    tx: Mutex<Option<mpsc::Sender<SurfaceFrame>>>,
    terminal: Arc<Mutex<Option<CaptureError>>>,
    next_sequence: AtomicU64,
    stats: Arc<FrameStats>,
}

impl FrameSink {
    /// Create a sink and the sequence it feeds.
    pub fn channel(queue_depth: usize, stats: Arc<FrameStats>) -> (Arc<FrameSink>, FrameSequence) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let terminal = Arc::new(Mutex::new(None));
        let sink = Arc::new(FrameSink {
            tx: Mutex::new(Some(tx)),
            terminal: Arc::clone(&terminal),
            next_sequence: AtomicU64::new(0),
            stats,
        });
        let sequence = FrameSequence {
            rx: Some(rx),
            terminal,
        };
        (sink, sequence)
    }

    /// Handle one raw buffer callback.
    ///
    /// Never blocks. Partial frames and frames without metadata are dropped.
    pub fn push(&self, sample: RawSample) {
        if sample.status != FrameStatus::Complete {
            self.stats.dropped_incomplete.fetch_add(1, Ordering::Relaxed);
            return;
        }
        if !sample.surface.is_valid() {
            self.stats
                .dropped_invalid_surface
                .fetch_add(1, Ordering::Relaxed);
            return;
        }
        let (Some(content_rect), Some(content_scale), Some(scale_factor)) =
            (sample.content_rect, sample.content_scale, sample.scale_factor)
        else {
            let dropped = self
                .stats
                .dropped_missing_metadata
                .fetch_add(1, Ordering::Relaxed)
                + 1;
            if dropped == 1 {
                warn!(
                    surface = ?sample.surface,
                    "Dropping frame without content rect/scale metadata"
                );
            } else {
                debug!(dropped, "Dropping frame without content rect/scale metadata");
            }
            return;
        };

        let guard = lock(&self.tx);
        // Closed: a late callback after stop or failure
        let Some(tx) = guard.as_ref() else {
            return;
        };

        let frame = SurfaceFrame {
            surface: sample.surface,
            content_rect,
            content_scale,
            scale_factor,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
        };

        match tx.try_send(frame) {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.stats
                    .dropped_backpressure
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// End the sequence with `error` after any frames already queued.
    ///
    /// Only the first terminal error is kept.
    pub fn fail(&self, error: CaptureError) {
        let mut tx = lock(&self.tx);
        if tx.is_none() {
            debug!(%error, "Ignoring stream error after sink closed");
            return;
        }
        lock(&self.terminal).get_or_insert(error);
        tx.take();
    }

    /// The platform stopped the stream on its own.
    ///
    /// This is the stream-level fatal error: the sequence ends with
    /// [`CaptureError::StreamFailed`] and nothing restarts the stream.
    pub fn platform_stopped(&self, detail: impl Into<String>) {
        self.fail(CaptureError::StreamFailed(detail.into()));
    }

    /// End the sequence cleanly. Later callbacks are ignored.
    pub fn close(&self) {
        lock(&self.tx).take();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tx).is_none()
    }
}

/// Lazy, non-restartable sequence of frames from one stream.
///
/// Yields frames in platform order, then either ends (`None`) after a clean
/// stop or yields one terminal error and ends.
pub struct FrameSequence {
    rx: Option<mpsc::Receiver<SurfaceFrame>>,
    terminal: Arc<Mutex<Option<CaptureError>>>,
}

impl FrameSequence {
    /// A sequence whose first and only element is `error`.
    pub fn failed(error: CaptureError) -> Self {
        Self {
            rx: None,
            terminal: Arc::new(Mutex::new(Some(error))),
        }
    }

    /// Next frame, terminal error, or `None` once the sequence is over.
    pub async fn next(&mut self) -> Option<Result<SurfaceFrame, CaptureError>> {
        std::future::poll_fn(|cx| self.poll_item(cx)).await
    }

    fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<SurfaceFrame, CaptureError>>> {
        if let Some(rx) = self.rx.as_mut() {
            match rx.poll_recv(cx) {
                Poll::Ready(Some(frame)) => return Poll::Ready(Some(Ok(frame))),
                Poll::Ready(None) => self.rx = None,
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(lock(&self.terminal).take().map(Err))
    }
}

impl Stream for FrameSequence {
    type Item = Result<SurfaceFrame, CaptureError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_item(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fake::FakeSurface;
    use crate::capture::types::SurfaceHandle;
    use futures_util::StreamExt;
    use glance_types::Rect;

    fn sample(id: u32) -> RawSample {
        RawSample::complete(
            FakeSurface::handle(id),
            Rect::new(0.0, 0.0, 300.0, 200.0),
            1.0,
            2.0,
        )
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order_then_clean_end() {
        let stats = Arc::new(FrameStats::default());
        let (sink, mut sequence) = FrameSink::channel(3, Arc::clone(&stats));

        sink.push(sample(1));
        sink.push(sample(2));
        sink.close();
        // Late callback after close is ignored
        sink.push(sample(3));

        let first = sequence.next().await.unwrap().unwrap();
        let second = sequence.next().await.unwrap().unwrap();
        assert_eq!(first.surface.surface_id(), Some(1));
        assert_eq!(second.surface.surface_id(), Some(2));
        assert!(first.sequence < second.sequence);
        assert!(sequence.next().await.is_none());
        assert_eq!(stats.snapshot().delivered, 2);
    }

    #[tokio::test]
    async fn test_partial_and_invalid_buffers_are_dropped_silently() {
        let stats = Arc::new(FrameStats::default());
        let (sink, sequence) = FrameSink::channel(3, Arc::clone(&stats));

        let mut idle = sample(1);
        idle.status = FrameStatus::Idle;
        sink.push(idle);

        let mut null = sample(2);
        null.surface = SurfaceHandle::null();
        sink.push(null);

        sink.push(RawSample::complete(
            FakeSurface::invalid_handle(3),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            1.0,
            1.0,
        ));
        sink.close();

        let items: Vec<_> = sequence.collect().await;
        assert!(items.is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dropped_incomplete, 1);
        assert_eq!(snapshot.dropped_invalid_surface, 2);
        assert_eq!(snapshot.delivered, 0);
    }

    #[tokio::test]
    async fn test_frame_without_scale_metadata_is_never_emitted() {
        let stats = Arc::new(FrameStats::default());
        let (sink, mut sequence) = FrameSink::channel(3, Arc::clone(&stats));

        let mut missing = sample(1);
        missing.content_scale = None;
        sink.push(missing);
        let mut missing_rect = sample(2);
        missing_rect.content_rect = None;
        sink.push(missing_rect);
        sink.push(sample(3));
        sink.close();

        let frame = sequence.next().await.unwrap().unwrap();
        assert_eq!(frame.surface.surface_id(), Some(3));
        assert_eq!(frame.size(), frame.content_rect.size());
        assert!(sequence.next().await.is_none());
        assert_eq!(stats.snapshot().dropped_missing_metadata, 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let stats = Arc::new(FrameStats::default());
        let (sink, mut sequence) = FrameSink::channel(3, Arc::clone(&stats));

        for id in 0..5 {
            sink.push(sample(id));
        }
        sink.close();

        let mut ids = Vec::new();
        while let Some(item) = sequence.next().await {
            ids.push(item.unwrap().surface.surface_id().unwrap());
        }
        assert_eq!(ids, vec![0, 1, 2]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 3);
        assert_eq!(snapshot.dropped_backpressure, 2);
        assert_eq!(snapshot.dropped(), 2);
    }

    #[tokio::test]
    async fn test_failure_ends_sequence_after_queued_frames() {
        let stats = Arc::new(FrameStats::default());
        let (sink, mut sequence) = FrameSink::channel(3, stats);

        sink.push(sample(1));
        sink.fail(CaptureError::StreamFailed("stopped".into()));
        sink.fail(CaptureError::StreamInterrupted("second".into()));

        assert!(sequence.next().await.unwrap().is_ok());
        assert_eq!(
            sequence.next().await.unwrap().unwrap_err(),
            CaptureError::StreamFailed("stopped".into())
        );
        assert!(sequence.next().await.is_none());
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_platform_stop_is_a_fatal_stream_error() {
        let stats = Arc::new(FrameStats::default());
        let (sink, mut sequence) = FrameSink::channel(3, stats);

        sink.platform_stopped("display went away");
        let error = sequence.next().await.unwrap().unwrap_err();
        assert_eq!(error, CaptureError::StreamFailed("display went away".into()));
        assert_eq!(error.severity(), crate::capture::ErrorSeverity::Fatal);
        assert!(sequence.next().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_sequence_yields_error_first() {
        let mut sequence = FrameSequence::failed(CaptureError::SourceGone(9));
        assert_eq!(
            sequence.next().await.unwrap().unwrap_err(),
            CaptureError::SourceGone(9)
        );
        assert!(sequence.next().await.is_none());
    }
}
