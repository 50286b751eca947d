//! Focus, title and existence of source windows, and bringing them forward.

use super::cg::{self, CgWindow};
use crate::capture::error::FocusError;
use crate::observer::ProbeResult;
use glance_types::{FocusSnapshot, SourceWindowRef};
use objc2::rc::Retained;
use objc2_app_kit::{NSApplicationActivationOptions, NSRunningApplication, NSWorkspace};
use objc2_foundation::NSString;
use tracing::debug;

/// PID of the frontmost application.
fn frontmost_pid() -> Option<i32> {
    let workspace = unsafe { NSWorkspace::sharedWorkspace() };
    let app: Retained<NSRunningApplication> = unsafe { workspace.frontmostApplication() }?;
    Some(unsafe { app.processIdentifier() })
}

/// Derive a snapshot from the frontmost PID and the front-to-back window list.
fn snapshot(
    source: &SourceWindowRef,
    frontmost_pid: Option<i32>,
    windows: &[CgWindow],
    title: Option<String>,
) -> FocusSnapshot {
    let is_source_app_focused = frontmost_pid == Some(source.pid);
    // The app's key window is its front-most normal-layer window
    let is_source_window_focused = is_source_app_focused
        && windows
            .iter()
            .find(|w| w.owner_pid == source.pid && w.layer == 0)
            .is_some_and(|w| w.window_id == source.window_id);

    FocusSnapshot {
        is_source_window_focused,
        is_source_app_focused,
        current_title: title,
    }
}

/// Probe the current state of `source` from scratch.
pub fn probe(source: &SourceWindowRef) -> ProbeResult {
    let Some(window) = cg::window(source.window_id) else {
        return ProbeResult::Gone;
    };
    let windows = cg::on_screen_windows();
    ProbeResult::Present(snapshot(source, frontmost_pid(), &windows, window.title))
}

/// Activate the application owning `source`.
pub fn focus(source: &SourceWindowRef) -> Result<(), FocusError> {
    let app = unsafe { NSRunningApplication::runningApplicationWithProcessIdentifier(source.pid) }
        .ok_or(FocusError::ApplicationNotRunning(source.pid))?;

    let name: Option<Retained<NSString>> = unsafe { app.localizedName() };
    debug!(
        window_id = source.window_id,
        pid = source.pid,
        app = name.map(|n| n.to_string()).unwrap_or_default(),
        "Activating source application"
    );

    let activated =
        unsafe { app.activateWithOptions(NSApplicationActivationOptions::ActivateAllWindows) };
    if activated {
        Ok(())
    } else {
        Err(FocusError::ActivationFailed(format!(
            "application {} refused activation",
            source.pid
        )))
    }
}
