//! Scripted in-memory platform for tests.
//!
//! Records every stream call, lets tests push raw buffers and stream errors
//! through the sink of the most recently opened stream, and queues failures
//! for upcoming platform calls.

use crate::capture::error::{CaptureError, FocusError};
use crate::capture::sink::FrameSink;
use crate::capture::stream_config::StreamConfig;
use crate::capture::types::{HardwareSurface, RawSample, SurfaceHandle};
use crate::capture::{CaptureBackend, PlatformStream, WindowFocuser};
use crate::observer::{ObserverError, SourceEvent, SourceObserver, SubscriptionId};
use glance_types::{Rect, SourceWindowRef};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct FakeSurface {
    id: u32,
    valid: bool,
}

impl FakeSurface {
    pub fn handle(id: u32) -> SurfaceHandle {
        SurfaceHandle::new(Arc::new(FakeSurface { id, valid: true }))
    }

    pub fn invalid_handle(id: u32) -> SurfaceHandle {
        SurfaceHandle::new(Arc::new(FakeSurface { id, valid: false }))
    }
}

impl HardwareSurface for FakeSurface {
    fn surface_id(&self) -> u32 {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.valid
    }
}

/// A platform call observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCall {
    Open(StreamConfig),
    Start,
    UpdateConfiguration(StreamConfig),
    UpdateContentFilter(u32),
    Stop,
}

#[derive(Default)]
struct FakeState {
    source_missing: bool,
    sink: Option<Arc<FrameSink>>,
    calls: Vec<StreamCall>,
    streams_opened: usize,
    active_streams: usize,
    max_active_streams: usize,
    stops_confirmed: usize,
    start_failures: VecDeque<CaptureError>,
    config_failures: VecDeque<CaptureError>,
    filter_failures: VecDeque<(CaptureError, bool)>,
    start_delay: Option<Duration>,
    filter_delay: Option<Duration>,
    focus_requests: Vec<u32>,
}

pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(FakeState::default())),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_source_exists(&self, exists: bool) {
        self.with(|s| s.source_missing = !exists);
    }

    pub fn fail_next_start(&self, error: CaptureError) {
        self.with(|s| s.start_failures.push_back(error));
    }

    pub fn fail_next_config_update(&self, error: CaptureError) {
        self.with(|s| s.config_failures.push_back(error));
    }

    pub fn fail_next_filter_update(&self, error: CaptureError) {
        self.with(|s| s.filter_failures.push_back((error, false)));
    }

    /// Fail the next filter step and leave no stream running behind it.
    pub fn lose_stream_on_next_filter_update(&self, error: CaptureError) {
        self.with(|s| s.filter_failures.push_back((error, true)));
    }

    /// Block every platform start for `delay`.
    pub fn delay_start(&self, delay: Duration) {
        self.with(|s| s.start_delay = Some(delay));
    }

    /// Block every content-filter step for `delay`.
    pub fn delay_filter_update(&self, delay: Duration) {
        self.with(|s| s.filter_delay = Some(delay));
    }

    fn current_sink(&self) -> Option<Arc<FrameSink>> {
        self.with(|s| s.sink.clone())
    }

    /// Push a raw buffer through the latest stream's sink.
    pub fn emit(&self, sample: RawSample) {
        if let Some(sink) = self.current_sink() {
            sink.push(sample);
        }
    }

    /// Push a complete 300x200 frame backed by surface `id`.
    pub fn emit_frame(&self, id: u32) {
        self.emit(RawSample::complete(
            FakeSurface::handle(id),
            Rect::new(0.0, 0.0, 300.0, 200.0),
            1.0,
            2.0,
        ));
    }

    /// Report a stream-level error from the platform.
    pub fn fail_stream(&self, error: CaptureError) {
        if let Some(sink) = self.current_sink() {
            sink.fail(error);
        }
    }

    /// The platform stops the stream on its own, as its error callback does.
    pub fn stop_from_platform(&self, detail: &str) {
        if let Some(sink) = self.current_sink() {
            sink.platform_stopped(detail);
        }
    }

    pub fn calls(&self) -> Vec<StreamCall> {
        self.with(|s| s.calls.clone())
    }

    /// Every configuration the platform was asked for, in order.
    pub fn configs(&self) -> Vec<StreamConfig> {
        self.with(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    StreamCall::Open(config) | StreamCall::UpdateConfiguration(config) => {
                        Some(*config)
                    }
                    _ => None,
                })
                .collect()
        })
    }

    pub fn streams_opened(&self) -> usize {
        self.with(|s| s.streams_opened)
    }

    pub fn active_streams(&self) -> usize {
        self.with(|s| s.active_streams)
    }

    pub fn max_active_streams(&self) -> usize {
        self.with(|s| s.max_active_streams)
    }

    pub fn stops_confirmed(&self) -> usize {
        self.with(|s| s.stops_confirmed)
    }

    pub fn focus_requests(&self) -> Vec<u32> {
        self.with(|s| s.focus_requests.clone())
    }
}

impl CaptureBackend for FakeBackend {
    fn source_exists(&self, _source: &SourceWindowRef) -> bool {
        self.with(|s| !s.source_missing)
    }

    fn open_stream(
        &self,
        _source: &SourceWindowRef,
        config: &StreamConfig,
        sink: Arc<FrameSink>,
    ) -> Result<Box<dyn PlatformStream>, CaptureError> {
        self.with(|s| {
            s.calls.push(StreamCall::Open(*config));
            s.streams_opened += 1;
            s.sink = Some(sink);
        });
        Ok(Box::new(FakeStream {
            state: Arc::clone(&self.state),
            started: false,
        }))
    }
}

impl WindowFocuser for FakeBackend {
    fn focus(&self, source: &SourceWindowRef) -> Result<(), FocusError> {
        self.with(|s| {
            if s.source_missing {
                return Err(FocusError::ApplicationNotRunning(source.pid));
            }
            s.focus_requests.push(source.window_id);
            Ok(())
        })
    }
}

struct FakeStream {
    state: Arc<Mutex<FakeState>>,
    started: bool,
}

impl FakeStream {
    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

impl PlatformStream for FakeStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        if let Some(delay) = self.with(|s| s.start_delay) {
            std::thread::sleep(delay);
        }
        let result = self.with(|s| {
            s.calls.push(StreamCall::Start);
            if let Some(error) = s.start_failures.pop_front() {
                return Err(error);
            }
            s.active_streams += 1;
            s.max_active_streams = s.max_active_streams.max(s.active_streams);
            Ok(())
        });
        self.started = result.is_ok();
        result
    }

    fn update_configuration(&mut self, config: &StreamConfig) -> Result<(), CaptureError> {
        self.with(|s| {
            s.calls.push(StreamCall::UpdateConfiguration(*config));
            s.config_failures.pop_front().map_or(Ok(()), Err)
        })
    }

    fn update_content_filter(&mut self, source: &SourceWindowRef) -> Result<(), CaptureError> {
        if let Some(delay) = self.with(|s| s.filter_delay) {
            std::thread::sleep(delay);
        }
        let started = self.started;
        let (result, lost) = self.with(|s| {
            s.calls.push(StreamCall::UpdateContentFilter(source.window_id));
            match s.filter_failures.pop_front() {
                None => (Ok(()), false),
                Some((error, lost)) => {
                    if lost {
                        if started {
                            s.active_streams -= 1;
                        }
                        if let Some(sink) = &s.sink {
                            sink.platform_stopped(format!(
                                "no stream running after filter swap: {}",
                                error
                            ));
                        }
                    }
                    (Err(error), lost)
                }
            }
        });
        if lost {
            self.started = false;
        }
        result
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let started = std::mem::take(&mut self.started);
        self.with(|s| {
            s.calls.push(StreamCall::Stop);
            if started {
                s.active_streams -= 1;
            }
            s.stops_confirmed += 1;
        });
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        if self.started {
            if let Ok(mut s) = self.state.lock() {
                s.active_streams -= 1;
            }
        }
    }
}

/// Observer whose events are pushed by the test.
#[derive(Default)]
pub struct FakeObserver {
    senders: Mutex<Vec<(SubscriptionId, mpsc::Sender<SourceEvent>)>>,
    next_id: Mutex<u64>,
}

impl FakeObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `event` to every live subscription.
    pub async fn send(&self, event: SourceEvent) {
        let senders: Vec<_> = self
            .senders
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(event.clone()).await;
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.senders.lock().unwrap().len()
    }
}

impl SourceObserver for FakeObserver {
    fn subscribe(
        &self,
        _source: &SourceWindowRef,
    ) -> Result<(SubscriptionId, mpsc::Receiver<SourceEvent>), ObserverError> {
        let (tx, rx) = mpsc::channel(16);
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = SubscriptionId(*next);
        self.senders.lock().unwrap().push((id, tx));
        Ok((id, rx))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.senders.lock().unwrap().retain(|(sid, _)| *sid != id);
    }
}
