//! macOS window enumeration using ScreenCaptureKit.
//!
//! Uses SCShareableContent for the set of capturable windows. Window bounds
//! and owner PID come from Core Graphics since the screencapturekit crate
//! doesn't expose them.

use super::cg;
use crate::capture::error::EnumerationError;
use glance_types::{Rect, WindowInfo};
use screencapturekit::sc_shareable_content::SCShareableContent;
use tracing::warn;

/// Smallest window edge considered a real window rather than a helper.
const MIN_WINDOW_EDGE: u32 = 50;

/// Bundle prefixes of system components that own windows but aren't apps.
const SYSTEM_BUNDLES: &[&str] = &[
    "com.apple.dock",
    "com.apple.controlcenter",
    "com.apple.notificationcenterui",
    "com.apple.systemuiserver",
    "com.apple.Spotlight",
    "com.apple.WindowManager",
];

fn is_system_window(bundle_id: &str, title: &str) -> bool {
    SYSTEM_BUNDLES.iter().any(|prefix| bundle_id.starts_with(prefix))
        || (bundle_id == "com.apple.finder" && title == "Desktop")
}

/// List all visible, capturable windows on macOS.
///
/// Requires screen recording permission; without it ScreenCaptureKit
/// refuses to enumerate.
pub fn list_windows() -> Result<Vec<WindowInfo>, EnumerationError> {
    let content = SCShareableContent::try_current().map_err(|e| {
        warn!("Failed to get SCShareableContent: {}", e);
        EnumerationError::PlatformError(format!(
            "failed to get shareable content (is Screen Recording permission granted?): {}",
            e
        ))
    })?;

    let mut windows: Vec<WindowInfo> = content
        .windows
        .iter()
        .filter_map(|window| {
            let title = match &window.title {
                Some(t) if !t.is_empty() => t.clone(),
                _ => return None,
            };

            // Layer 0 = normal windows, other layers are system UI elements
            if !window.is_on_screen || window.window_layer != 0 {
                return None;
            }
            if window.width < MIN_WINDOW_EDGE || window.height < MIN_WINDOW_EDGE {
                return None;
            }

            let app = window.owning_application.as_ref()?;
            let process_name = app
                .application_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            let bundle_id = app.bundle_identifier.clone().unwrap_or_default();
            if is_system_window(&bundle_id, &title) {
                return None;
            }

            // Without an owner PID the window can't be observed or focused
            let cg_window = cg::window(window.window_id)?;
            let frame = if cg_window.bounds.width > 0.0 && cg_window.bounds.height > 0.0 {
                cg_window.bounds
            } else {
                Rect::new(0.0, 0.0, window.width as f64, window.height as f64)
            };

            Some(WindowInfo {
                window_id: window.window_id,
                pid: cg_window.owner_pid,
                title,
                process_name,
                frame,
            })
        })
        .collect();

    // Sort by process name, then by title for consistent ordering
    windows.sort_by(|a, b| {
        a.process_name
            .cmp(&b.process_name)
            .then_with(|| a.title.cmp(&b.title))
    });

    Ok(windows)
}
