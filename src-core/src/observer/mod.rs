//! Source focus/title observation.
//!
//! The session coordinator subscribes to a source window and receives a
//! stream of [`SourceEvent`]s. How the events are produced (notifications or
//! polling) is up to the implementation.

pub mod polling;

pub use polling::PollingSourceObserver;

use glance_types::{FocusSnapshot, SourceWindowRef};
use thiserror::Error;
use tokio::sync::mpsc;

/// Opaque handle for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Something changed about the observed source window.
///
/// Focus and title events always carry a complete, freshly computed
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    FocusChanged(FocusSnapshot),
    TitleChanged(FocusSnapshot),
    SourceGone,
}

impl SourceEvent {
    pub fn snapshot(&self) -> Option<&FocusSnapshot> {
        match self {
            SourceEvent::FocusChanged(s) | SourceEvent::TitleChanged(s) => Some(s),
            SourceEvent::SourceGone => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("source window {0} is not observable")]
    NotObservable(u32),

    #[error("observer is not running: {0}")]
    Unavailable(String),
}

/// Event source for focus, title and existence of a source window.
///
/// Events for one subscription arrive on a single receiver, in order. A
/// `SourceGone` event is sent at least once if the window closes while
/// subscribed.
pub trait SourceObserver: Send + Sync {
    fn subscribe(
        &self,
        source: &SourceWindowRef,
    ) -> Result<(SubscriptionId, mpsc::Receiver<SourceEvent>), ObserverError>;

    /// Stop delivering events for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Result of one probe of a source window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Present(FocusSnapshot),
    Gone,
}

/// Computes the current focus/title snapshot of a window from scratch.
pub trait WindowProbe: Send + Sync + 'static {
    fn probe(&self, source: &SourceWindowRef) -> ProbeResult;
}
