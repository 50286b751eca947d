//! Glance capture core.
//!
//! Turns a source window into a live stream of hardware surfaces for an
//! always-on-top preview:
//!
//! - [`capture`]: stream configuration, the capture engine and platform backends
//! - [`session`]: the per-preview coordinator state machine
//! - [`observer`]: focus/title/existence tracking of the source window
//! - [`config`]: persisted user settings

pub mod capture;
pub mod config;
pub mod logging;
pub mod observer;
pub mod session;

pub use capture::{get_backend, list_windows, CaptureError, PlatformBackend, StreamConfig, SurfaceFrame};
pub use config::{load_config, save_config, AppConfig};
pub use session::{SessionError, SessionHandle, SessionOptions, SessionServices, SessionStatus};

use std::sync::Arc;
use std::time::Duration;

/// Services backed by the platform, with a polling source observer.
pub fn platform_services(config: &AppConfig) -> SessionServices {
    let backend = Arc::new(get_backend());
    let observer = observer::PollingSourceObserver::new(
        Arc::clone(&backend),
        Duration::from_millis(config.observer.poll_interval_ms),
    );
    SessionServices {
        backend: backend.clone(),
        observer: Arc::new(observer),
        focuser: backend,
    }
}
