//! The coordinator's single-writer task.

use super::policy::{classify, ReconfigurePolicy, Recovery, RetryBudget};
use super::{SessionError, SessionOptions, SessionServices, SessionStatus};
use crate::capture::stream_config::validate_frame_rate;
use crate::capture::{CaptureEngine, CaptureError, FrameSequence, StreamConfig, SurfaceFrame};
use crate::observer::{SourceEvent, SubscriptionId};
use glance_types::{CaptureSessionState, FailureReason, FocusSnapshot, SourceWindowRef};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub(super) enum Command {
    Bind {
        source: SourceWindowRef,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Start {
        reply: oneshot::Sender<Result<CaptureSessionState, SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SetFrameRate {
        fps: f64,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    FocusSource {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Why the actor woke up.
enum Wake {
    Command(Command),
    Shutdown,
    Frame(Option<Result<SurfaceFrame, CaptureError>>),
    Source(Option<SourceEvent>),
    Retry,
}

async fn next_frame(
    frames: &mut Option<FrameSequence>,
) -> Option<Result<SurfaceFrame, CaptureError>> {
    match frames {
        Some(frames) => frames.next().await,
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<SourceEvent>>) -> Option<SourceEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn retry_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub(super) struct SessionActor {
    services: SessionServices,
    options: SessionOptions,
    engine: CaptureEngine,
    commands: mpsc::Receiver<Command>,
    status_tx: watch::Sender<SessionStatus>,

    state: CaptureSessionState,
    source: Option<SourceWindowRef>,
    frame_rate: f64,
    frames: Option<FrameSequence>,
    events: Option<mpsc::Receiver<SourceEvent>>,
    subscription: Option<SubscriptionId>,
    retry_at: Option<Instant>,
    retries: RetryBudget,
    last_frame: Option<SurfaceFrame>,
    last_error: Option<CaptureError>,
    focus: FocusSnapshot,
}

impl SessionActor {
    pub(super) fn new(
        services: SessionServices,
        options: SessionOptions,
        commands: mpsc::Receiver<Command>,
        status_tx: watch::Sender<SessionStatus>,
    ) -> Self {
        let engine = CaptureEngine::new(services.backend.clone());
        Self {
            engine,
            commands,
            status_tx,
            state: CaptureSessionState::Idle,
            source: None,
            frame_rate: options.frame_rate,
            frames: None,
            events: None,
            subscription: None,
            retry_at: None,
            retries: RetryBudget::new(options.retry_ceiling),
            last_frame: None,
            last_error: None,
            focus: FocusSnapshot::default(),
            services,
            options,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Shutdown,
                },
                item = next_frame(&mut self.frames) => Wake::Frame(item),
                event = next_event(&mut self.events) => Wake::Source(event),
                _ = retry_due(self.retry_at) => Wake::Retry,
            };

            match wake {
                Wake::Command(command) => self.handle_command(command).await,
                Wake::Shutdown => break,
                Wake::Frame(Some(Ok(frame))) => self.handle_frame(frame),
                Wake::Frame(Some(Err(e))) => self.handle_stream_end(e).await,
                Wake::Frame(None) => {
                    // Only stop() ends a sequence on purpose, and it drops
                    // the sequence first.
                    self.handle_stream_end(CaptureError::StreamInterrupted(
                        "stream ended unexpectedly".to_string(),
                    ))
                    .await
                }
                Wake::Source(Some(event)) => self.handle_source_event(event).await,
                Wake::Source(None) => {
                    debug!("Source observer closed its event stream");
                    self.events = None;
                }
                Wake::Retry => self.handle_retry().await,
            }
        }

        self.shutdown().await;
    }

    fn publish(&self) {
        let stats = self.engine.stats();
        let status = SessionStatus {
            state: self.state.clone(),
            is_capturing: matches!(
                self.state,
                CaptureSessionState::Capturing | CaptureSessionState::Reconfiguring
            ),
            last_frame: self.last_frame.clone(),
            last_error: self.last_error.clone(),
            focus: self.focus.clone(),
            source: self.source.clone(),
            stream_config: self.engine.config().copied(),
            frame_rate: self.frame_rate,
            retry_attempts: self.retries.failures(),
            frames_delivered: stats.delivered,
            frames_dropped: stats.dropped(),
        };
        self.status_tx.send_replace(status);
    }

    fn transition(&mut self, state: CaptureSessionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Session state change");
        }
        self.state = state;
        self.publish();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Bind { source, reply } => {
                let _ = reply.send(self.bind(source));
            }
            Command::Start { reply } => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::SetFrameRate { fps, reply } => {
                let result = self.set_frame_rate(fps).await;
                let _ = reply.send(result);
            }
            Command::FocusSource { reply } => {
                let _ = reply.send(self.focus_source());
            }
        }
    }

    fn bind(&mut self, source: SourceWindowRef) -> Result<(), SessionError> {
        if self.state != CaptureSessionState::Idle {
            return Err(SessionError::SourceLocked(self.state.clone()));
        }

        self.unsubscribe();
        self.focus = FocusSnapshot::default();
        match self.services.observer.subscribe(&source) {
            Ok((id, events)) => {
                self.subscription = Some(id);
                self.events = Some(events);
            }
            Err(e) => warn!(window_id = source.window_id, error = %e, "Source window will not be observed"),
        }

        info!(window_id = source.window_id, pid = source.pid, "Bound source window");
        self.source = Some(source);
        self.publish();
        Ok(())
    }

    async fn start(&mut self) -> Result<CaptureSessionState, SessionError> {
        if self.state != CaptureSessionState::Idle {
            debug!(state = %self.state, "Start ignored; session already running");
            return Ok(self.state.clone());
        }
        let source = self.source.clone().ok_or(SessionError::NoSource)?;

        let config = StreamConfig::build(&source, self.frame_rate);
        if let Err(e) = config.validate() {
            warn!(window_id = source.window_id, error = %e, "Refusing to start capture");
            self.last_error = Some(e.clone());
            self.transition(CaptureSessionState::Failed(FailureReason::Configuration {
                detail: e.to_string(),
            }));
            return Err(e.into());
        }

        self.retries.reset();
        self.last_error = None;
        self.transition(CaptureSessionState::Starting);
        self.launch(config, &source).await;
        Ok(self.state.clone())
    }

    /// Start the engine and hook up its frame sequence.
    async fn launch(&mut self, config: StreamConfig, source: &SourceWindowRef) {
        info!(
            window_id = source.window_id,
            width = config.width,
            height = config.height,
            fps = config.requested_fps,
            attempt = self.retries.failures(),
            "Starting capture"
        );
        self.frames = Some(self.engine.start(config, source).await);
        self.publish();
    }

    async fn stop(&mut self) {
        if self.state == CaptureSessionState::Idle {
            return;
        }
        self.transition(CaptureSessionState::Stopping);

        self.retry_at = None;
        // Frames still queued are never rendered
        self.frames = None;
        if let Err(e) = self.engine.stop().await {
            warn!(error = %e, "Error while stopping capture");
        }

        self.last_frame = None;
        self.retries.reset();
        info!("Capture session stopped");
        self.transition(CaptureSessionState::Idle);
    }

    async fn set_frame_rate(&mut self, fps: f64) -> Result<(), SessionError> {
        validate_frame_rate(fps)?;
        let previous = self.frame_rate;
        self.frame_rate = fps;

        let source = match (&self.state, &self.source) {
            (CaptureSessionState::Capturing, Some(source)) => source.clone(),
            _ => {
                // Picked up by the next start or retry
                self.publish();
                return Ok(());
            }
        };

        let config = StreamConfig::build(&source, fps);
        info!(window_id = source.window_id, from = previous, to = fps, "Reconfiguring capture");
        self.transition(CaptureSessionState::Reconfiguring);

        let (result, ended) = self.reconfigure_draining(config).await;
        if let Some(error) = ended {
            warn!(error = %error, "Frame sequence ended during reconfigure");
            self.handle_stream_end(error).await;
            return result.map_err(SessionError::from);
        }

        match result {
            Ok(()) => {
                self.transition(CaptureSessionState::Capturing);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                match self.options.reconfigure_policy {
                    ReconfigurePolicy::KeepPrevious => {
                        warn!(error = %e, "Reconfigure failed; keeping previous stream configuration");
                        self.transition(CaptureSessionState::Capturing);
                    }
                    ReconfigurePolicy::Restart => {
                        warn!(error = %e, "Reconfigure failed; restarting stream");
                        self.frames = None;
                        if let Err(stop_err) = self.engine.stop().await {
                            warn!(error = %stop_err, "Error while stopping capture");
                        }
                        self.transition(CaptureSessionState::Starting);
                        self.launch(config, &source).await;
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Run `engine.reconfigure` while frames keep flowing to the status.
    ///
    /// Returns the reconfigure result and, if the sequence ended meanwhile,
    /// the error it ended with.
    async fn reconfigure_draining(
        &mut self,
        config: StreamConfig,
    ) -> (Result<(), CaptureError>, Option<CaptureError>) {
        let mut ended = None;
        let reconfigure = self.engine.reconfigure(config);
        tokio::pin!(reconfigure);

        let result = loop {
            tokio::select! {
                result = &mut reconfigure => break result,
                item = next_frame(&mut self.frames), if ended.is_none() => match item {
                    Some(Ok(frame)) => {
                        if frame.is_renderable() {
                            self.last_frame = Some(frame.clone());
                            self.status_tx.send_modify(|status| status.last_frame = Some(frame));
                        }
                    }
                    Some(Err(e)) => ended = Some(e),
                    None => {
                        ended = Some(CaptureError::StreamInterrupted(
                            "stream ended unexpectedly".to_string(),
                        ))
                    }
                },
            }
        };
        (result, ended)
    }

    fn focus_source(&self) -> Result<(), SessionError> {
        let source = self.source.as_ref().ok_or(SessionError::NoSource)?;
        self.services.focuser.focus(source)?;
        Ok(())
    }

    fn handle_frame(&mut self, frame: SurfaceFrame) {
        if !frame.is_renderable() {
            return;
        }
        if self.state == CaptureSessionState::Starting {
            info!(sequence = frame.sequence, "First frame received");
            self.retries.reset();
            self.state = CaptureSessionState::Capturing;
        }
        self.last_frame = Some(frame);
        self.publish();
    }

    /// The frame sequence ended with `error`.
    async fn handle_stream_end(&mut self, error: CaptureError) {
        self.frames = None;
        if let Err(e) = self.engine.stop().await {
            debug!(error = %e, "Error while releasing failed stream");
        }

        let source_exists = self
            .source
            .as_ref()
            .is_some_and(|s| self.services.backend.source_exists(s));
        let recovery = classify(&error, source_exists);
        self.last_error = Some(error.clone());

        match recovery {
            Recovery::Retry if self.retries.record_failure() => {
                let backoff = self.options.retry_backoff;
                warn!(
                    error = %error,
                    attempt = self.retries.failures(),
                    ceiling = self.retries.ceiling(),
                    backoff_ms = backoff.as_millis() as u64,
                    "Capture stream failed; retrying"
                );
                self.retry_at = Some(Instant::now() + backoff);
                self.transition(CaptureSessionState::Starting);
            }
            Recovery::Retry => {
                self.fail(FailureReason::StreamUnstable {
                    attempts: self.retries.failures(),
                });
            }
            Recovery::Fail(reason) => self.fail(reason),
        }
    }

    async fn handle_retry(&mut self) {
        self.retry_at = None;
        if self.state != CaptureSessionState::Starting {
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };
        if !self.services.backend.source_exists(&source) {
            self.last_error = Some(CaptureError::SourceGone(source.window_id));
            self.fail(FailureReason::SourceClosed);
            return;
        }
        let config = StreamConfig::build(&source, self.frame_rate);
        self.launch(config, &source).await;
    }

    async fn handle_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::FocusChanged(snapshot) | SourceEvent::TitleChanged(snapshot) => {
                self.focus = snapshot;
                self.publish();
            }
            SourceEvent::SourceGone => {
                let window_id = self.source.as_ref().map(|s| s.window_id).unwrap_or_default();
                info!(window_id, "Source window closed");
                self.unsubscribe();
                self.focus = FocusSnapshot::default();

                let active = matches!(
                    self.state,
                    CaptureSessionState::Starting
                        | CaptureSessionState::Capturing
                        | CaptureSessionState::Reconfiguring
                );
                if active {
                    self.frames = None;
                    if let Err(e) = self.engine.stop().await {
                        debug!(error = %e, "Error while stopping capture of closed window");
                    }
                    self.last_error = Some(CaptureError::SourceGone(window_id));
                    self.fail(FailureReason::SourceClosed);
                } else {
                    self.publish();
                }
            }
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        error!(reason = %reason, "Capture session failed");
        self.retry_at = None;
        self.frames = None;
        self.transition(CaptureSessionState::Failed(reason));
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.services.observer.unsubscribe(id);
        }
        self.events = None;
    }

    async fn shutdown(&mut self) {
        debug!("Session handles dropped; shutting down coordinator");
        self.retry_at = None;
        self.frames = None;
        if let Err(e) = self.engine.stop().await {
            warn!(error = %e, "Error while stopping capture");
        }
        self.unsubscribe();
    }
}
