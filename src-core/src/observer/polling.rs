//! Polling implementation of [`SourceObserver`].
//!
//! One tokio task per subscription probes the window every poll interval
//! and forwards changes. Each probe recomputes the whole snapshot; the task
//! only compares it with the last snapshot it sent.

use super::{ObserverError, ProbeResult, SourceEvent, SourceObserver, SubscriptionId, WindowProbe};
use glance_types::{FocusSnapshot, SourceWindowRef};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

const EVENT_BUFFER: usize = 16;

pub struct PollingSourceObserver<P: WindowProbe> {
    probe: Arc<P>,
    poll_interval: Duration,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl<P: WindowProbe> PollingSourceObserver<P> {
    pub fn new(probe: Arc<P>, poll_interval: Duration) -> Self {
        Self {
            probe,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of subscriptions whose task is still running.
    pub fn active_subscriptions(&self) -> usize {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|_, task| !task.is_finished());
                tasks.len()
            }
            Err(_) => 0,
        }
    }
}

/// Event to send for `current` given the last snapshot sent, if any.
fn diff(last: Option<&FocusSnapshot>, current: &FocusSnapshot) -> Option<SourceEvent> {
    let Some(last) = last else {
        return Some(SourceEvent::FocusChanged(current.clone()));
    };
    if last.is_source_window_focused != current.is_source_window_focused
        || last.is_source_app_focused != current.is_source_app_focused
    {
        Some(SourceEvent::FocusChanged(current.clone()))
    } else if last.current_title != current.current_title {
        Some(SourceEvent::TitleChanged(current.clone()))
    } else {
        None
    }
}

async fn poll_source<P: WindowProbe>(
    probe: Arc<P>,
    source: SourceWindowRef,
    poll_interval: Duration,
    tx: mpsc::Sender<SourceEvent>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last: Option<FocusSnapshot> = None;

    loop {
        ticker.tick().await;

        let probe = Arc::clone(&probe);
        let target = source.clone();
        let result = match tokio::task::spawn_blocking(move || probe.probe(&target)).await {
            Ok(result) => result,
            Err(e) => {
                debug!(window_id = source.window_id, error = %e, "Window probe task failed");
                continue;
            }
        };

        match result {
            ProbeResult::Gone => {
                debug!(window_id = source.window_id, "Observed source window is gone");
                let _ = tx.send(SourceEvent::SourceGone).await;
                return;
            }
            ProbeResult::Present(snapshot) => {
                if let Some(event) = diff(last.as_ref(), &snapshot) {
                    trace!(window_id = source.window_id, ?event, "Source window changed");
                    if tx.send(event).await.is_err() {
                        // Subscriber went away
                        return;
                    }
                    last = Some(snapshot);
                }
            }
        }
    }
}

impl<P: WindowProbe> SourceObserver for PollingSourceObserver<P> {
    fn subscribe(
        &self,
        source: &SourceWindowRef,
    ) -> Result<(SubscriptionId, mpsc::Receiver<SourceEvent>), ObserverError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ObserverError::Unavailable(e.to_string()))?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = runtime.spawn(poll_source(
            Arc::clone(&self.probe),
            source.clone(),
            self.poll_interval,
            tx,
        ));

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| ObserverError::Unavailable("subscription table poisoned".to_string()))?;
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, task);

        debug!(window_id = source.window_id, subscription = id.0, "Subscribed to source window");
        Ok((id, rx))
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let task = match self.tasks.lock() {
            Ok(mut tasks) => tasks.remove(&id),
            Err(_) => None,
        };
        if let Some(task) = task {
            task.abort();
            debug!(subscription = id.0, "Unsubscribed from source window");
        }
    }
}

impl<P: WindowProbe> Drop for PollingSourceObserver<P> {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}
