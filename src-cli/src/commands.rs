//! CLI command implementations.

use crate::colors;
use crate::exit_codes::ExitCode;
use crate::PreviewOptions;
use glance_core::capture::{EnumerationError, FocusError};
use glance_core::config::{config_path, load_config};
use glance_core::{platform_services, SessionError, SessionHandle, SessionOptions, SessionStatus};
use glance_types::{CaptureSessionState, WindowInfo};
use serde_json::json;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Enumerate windows off the async executor.
async fn enumerate_windows() -> Result<Vec<WindowInfo>, EnumerationError> {
    match tokio::task::spawn_blocking(glance_core::list_windows).await {
        Ok(result) => result,
        Err(e) => Err(EnumerationError::PlatformError(format!(
            "window enumeration task failed: {}",
            e
        ))),
    }
}

fn enumeration_exit_code(e: &EnumerationError) -> ExitCode {
    match e {
        EnumerationError::NotImplemented(_) => ExitCode::Unsupported,
        EnumerationError::PlatformError(_) => ExitCode::GeneralError,
    }
}

/// Find a capturable window by ID.
async fn resolve_window(window_id: u32, quiet: bool) -> Result<WindowInfo, ExitCode> {
    let windows = match enumerate_windows().await {
        Ok(windows) => windows,
        Err(e) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
            }
            return Err(enumeration_exit_code(&e));
        }
    };

    match windows.into_iter().find(|w| w.window_id == window_id) {
        Some(window) => Ok(window),
        None => {
            if !quiet {
                eprintln!(
                    "{}",
                    colors::error(&format!("Window {} not found.", window_id))
                );
                eprintln!("Use 'glance list windows' to see capturable windows.");
            }
            Err(ExitCode::WindowNotFound)
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > 60 {
        let head: String = title.chars().take(57).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}

/// List available windows.
pub async fn list_windows(json: bool, quiet: bool) -> ExitCode {
    let windows = match enumerate_windows().await {
        Ok(windows) => windows,
        Err(e) => {
            if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
            }
            return enumeration_exit_code(&e);
        }
    };

    if json {
        match serde_json::to_string_pretty(&windows) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("{}", colors::error(&e.to_string()));
                return ExitCode::GeneralError;
            }
        }
    } else if windows.is_empty() {
        if !quiet {
            println!("{}", colors::dim("No capturable windows found."));
        }
    } else {
        // Calculate column widths
        let id_width = windows
            .iter()
            .map(|w| w.window_id.to_string().len())
            .max()
            .unwrap_or(2)
            .max(2);
        let process_width = windows
            .iter()
            .map(|w| w.process_name.len())
            .max()
            .unwrap_or(7)
            .max(7);

        println!(
            "{}  {}  {}  {}",
            colors::column("ID", id_width, colors::header),
            colors::column("PROCESS", process_width, colors::header),
            colors::column("SIZE", 11, colors::header),
            colors::header("TITLE")
        );
        println!(
            "{}  {}  {}  {}",
            "-".repeat(id_width),
            "-".repeat(process_width),
            "-".repeat(11),
            "-".repeat(5)
        );

        for window in windows {
            let size = format!("{}x{}", window.frame.width, window.frame.height);
            println!(
                "{}  {:<process_width$}  {:<11}  {}",
                colors::column(&window.window_id.to_string(), id_width, colors::id),
                window.process_name,
                size,
                truncate_title(&window.title)
            );
        }
    }
    ExitCode::Success
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Failed to set up signal handlers: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

/// Resolves on Ctrl+C.
#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to set up Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Sleep for `secs` seconds, or forever when no limit is set.
fn optional_sleep(secs: Option<u64>) -> impl Future<Output = ()> {
    async move {
        match secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    }
}

fn print_event(event: serde_json::Value) {
    println!("{}", event);
}

/// Report what changed between two published statuses.
fn report_changes(previous: &SessionStatus, current: &SessionStatus, json: bool, quiet: bool) {
    if current.state != previous.state {
        if json {
            print_event(json!({ "event": "state", "state": current.state }));
        } else if !quiet {
            println!("{} {}", colors::bold("State:"), colors::state(&current.state));
            if let CaptureSessionState::Failed(reason) = &current.state {
                eprintln!(
                    "{}",
                    colors::warning(&format!("{}; {}", reason, reason.user_action()))
                );
            }
        }
    }

    if current.focus != previous.focus {
        if json {
            print_event(json!({ "event": "focus", "focus": current.focus }));
        } else if !quiet {
            if current.source_title() != previous.source_title() {
                println!(
                    "{} {}",
                    colors::bold("Title:"),
                    current.source_title().unwrap_or("")
                );
            }
            if current.is_source_window_focused() != previous.is_source_window_focused()
                || current.is_source_app_focused() != previous.is_source_app_focused()
            {
                println!(
                    "{} window {}  app {}",
                    colors::bold("Focus:"),
                    colors::flag(current.is_source_window_focused()),
                    colors::flag(current.is_source_app_focused()),
                );
            }
        }
    }
}

/// Run a preview session for a window until interrupted, timed out or failed.
pub async fn preview(options: PreviewOptions, json: bool, quiet: bool) -> ExitCode {
    let window = match resolve_window(options.window_id, quiet).await {
        Ok(window) => window,
        Err(code) => return code,
    };

    let config = load_config();
    let mut session_options = SessionOptions::from(&config);
    if let Some(fps) = options.fps {
        session_options.frame_rate = fps;
    }

    let session = SessionHandle::spawn(platform_services(&config), session_options);
    let mut updates = session.subscribe();

    if let Err(e) = session.bind(window.source_ref()).await {
        if !quiet {
            eprintln!("{}", colors::error(&e.to_string()));
        }
        return ExitCode::GeneralError;
    }

    if let Err(e) = session.start().await {
        if !quiet {
            eprintln!("{}", colors::error(&format!("Preview failed to start: {}", e)));
        }
        return match e {
            SessionError::Capture(_) => ExitCode::for_state(&session.status().state),
            _ => ExitCode::GeneralError,
        };
    }

    if json {
        print_event(json!({
            "event": "started",
            "window_id": window.window_id,
            "title": window.title,
            "frame_rate": session.status().frame_rate,
        }));
    } else if !quiet {
        println!(
            "{} {} {}",
            colors::live("Previewing"),
            colors::id(&window.window_id.to_string()),
            colors::dim(&format!("({} - {})", window.process_name, window.title))
        );
    }

    let shutdown = shutdown_signal();
    let time_limit = optional_sleep(options.duration);
    let mut pending_switch = options.switch_fps;
    let switch_timer = optional_sleep(options.after);
    tokio::pin!(shutdown, time_limit, switch_timer);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    let started = Instant::now();
    let mut previous = SessionStatus::default();
    let mut frames_at_tick = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if !quiet && !json {
                    eprintln!("{}", colors::info("Stopping preview..."));
                }
                break;
            }
            _ = &mut time_limit => {
                if !quiet && !json {
                    eprintln!("{}", colors::info("Duration limit reached. Stopping preview..."));
                }
                break;
            }
            _ = &mut switch_timer, if pending_switch.is_some() => {
                let Some(fps) = pending_switch.take() else { continue };
                debug!(fps, "Switching preview frame rate");
                match session.set_frame_rate(fps).await {
                    Ok(()) => {
                        if json {
                            print_event(json!({ "event": "frame_rate", "frame_rate": fps }));
                        } else if !quiet {
                            println!("{} {} fps", colors::bold("Frame rate:"), fps);
                        }
                    }
                    Err(e) => {
                        if json {
                            print_event(json!({ "event": "reconfigure_failed", "error": e.to_string() }));
                        } else if !quiet {
                            eprintln!("{}", colors::warning(&format!("Frame rate change failed: {}", e)));
                        }
                    }
                }
            }
            _ = ticker.tick() => {
                let status = session.status();
                let delivered = status.frames_delivered.saturating_sub(frames_at_tick);
                frames_at_tick = status.frames_delivered;
                if status.is_capturing {
                    if json {
                        print_event(json!({
                            "event": "frames",
                            "fps": delivered,
                            "dropped": status.frames_dropped,
                        }));
                    } else if !quiet {
                        let elapsed = started.elapsed().as_secs();
                        println!(
                            "{} {} fps {}",
                            colors::clock(elapsed),
                            delivered,
                            colors::dim(&format!("({} dropped)", status.frames_dropped))
                        );
                    }
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = updates.borrow_and_update().clone();
                report_changes(&previous, &current, json, quiet);
                let failed = current.state.is_failed();
                previous = current;
                if failed {
                    break;
                }
            }
        }
    }

    let final_state = session.status().state;
    if let Err(e) = session.stop().await {
        debug!(error = %e, "Error stopping preview session");
    }

    if json {
        print_event(json!({ "event": "stopped", "state": final_state }));
    } else if !quiet && !final_state.is_failed() {
        println!("{}", colors::success("Preview stopped."));
    }
    ExitCode::for_state(&final_state)
}

/// Bring the application owning a window to the front.
pub async fn focus(window_id: u32, json: bool, quiet: bool) -> ExitCode {
    let window = match resolve_window(window_id, quiet).await {
        Ok(window) => window,
        Err(code) => return code,
    };

    let config = load_config();
    let session = SessionHandle::spawn(platform_services(&config), SessionOptions::from(&config));
    let result = match session.bind(window.source_ref()).await {
        Ok(()) => session.focus_source().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            if json {
                print_event(json!({ "status": "focused", "window_id": window_id }));
            } else if !quiet {
                println!(
                    "{} {}",
                    colors::success("Focused"),
                    colors::dim(&format!("({} - {})", window.process_name, window.title))
                );
            }
            ExitCode::Success
        }
        Err(e) => {
            if json {
                print_event(json!({ "status": "error", "error": e.to_string() }));
            } else if !quiet {
                eprintln!("{}", colors::error(&e.to_string()));
            }
            match e {
                SessionError::Focus(FocusError::Unsupported) => ExitCode::Unsupported,
                SessionError::Focus(FocusError::ApplicationNotRunning(_)) => ExitCode::WindowNotFound,
                _ => ExitCode::GeneralError,
            }
        }
    }
}

/// Show where settings live and what is in effect.
pub fn config(json: bool) -> ExitCode {
    let path = match config_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            return ExitCode::GeneralError;
        }
    };
    let config = load_config();

    if json {
        print_event(json!({ "path": path, "exists": path.exists(), "config": config }));
        return ExitCode::Success;
    }

    let exists = if path.exists() {
        String::new()
    } else {
        colors::dim(" (not created, using defaults)")
    };
    println!("{} {}{}", colors::bold("Config:"), colors::bold(&path.display().to_string()), exists);
    println!("{}", colors::header("capture"));
    println!("  frame_rate           {}", config.capture.frame_rate);
    println!("  retry_ceiling        {}", config.capture.retry_ceiling);
    println!("  retry_backoff_ms     {}", config.capture.retry_backoff_ms);
    println!("  reconfigure_failure  {}", config.capture.reconfigure_failure.as_str());
    println!("{}", colors::header("observer"));
    println!("  poll_interval_ms     {}", config.observer.poll_interval_ms);
    ExitCode::Success
}

/// Show version information.
pub fn version(json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!(r#"{{"version": "{}"}}"#, version);
    } else {
        println!("{} {}", colors::bold("glance"), version);
    }
}
