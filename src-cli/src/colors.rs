//! Styling for `glance` terminal output.
//!
//! Text is only styled when the stream it is written to is a terminal, so
//! piped output and `--json` consumers always see plain text.

use glance_types::CaptureSessionState;
use owo_colors::{OwoColorize, Style};
use std::io::IsTerminal;

/// Stream a piece of text ends up on.
#[derive(Debug, Clone, Copy)]
enum Target {
    Stdout,
    Stderr,
}

impl Target {
    fn is_terminal(self) -> bool {
        match self {
            Target::Stdout => std::io::stdout().is_terminal(),
            Target::Stderr => std::io::stderr().is_terminal(),
        }
    }
}

fn paint(text: &str, style: Style, styled: bool) -> String {
    if styled {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

fn to(target: Target, text: &str, style: Style) -> String {
    paint(text, style, target.is_terminal())
}

/// `error: <msg>` for stderr.
pub fn error(msg: &str) -> String {
    format!("{} {}", to(Target::Stderr, "error:", Style::new().red().bold()), msg)
}

/// `warning: <msg>` for stderr.
pub fn warning(msg: &str) -> String {
    format!("{} {}", to(Target::Stderr, "warning:", Style::new().yellow().bold()), msg)
}

/// Progress notes printed to stderr while a preview runs.
pub fn info(msg: &str) -> String {
    to(Target::Stderr, msg, Style::new().cyan())
}

pub fn success(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().green())
}

pub fn dim(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().dimmed())
}

pub fn bold(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().bold())
}

/// Table and section headings.
pub fn header(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().bold().blue())
}

pub fn live(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().green().bold())
}

/// Window IDs, which users copy into other commands.
pub fn id(msg: &str) -> String {
    to(Target::Stdout, msg, Style::new().cyan())
}

/// Left-align `text` in a `width` column, padding before styling so escape
/// codes don't count towards the width.
pub fn column(text: &str, width: usize, style: fn(&str) -> String) -> String {
    style(&format!("{:<width$}", text))
}

/// `yes` or `no` for a focus flag.
pub fn flag(on: bool) -> String {
    if on {
        to(Target::Stdout, "yes", Style::new().green())
    } else {
        to(Target::Stdout, "no", Style::new().dimmed())
    }
}

fn clock_text(elapsed_secs: u64) -> String {
    format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}

/// Elapsed preview time as `mm:ss`.
pub fn clock(elapsed_secs: u64) -> String {
    to(Target::Stdout, &clock_text(elapsed_secs), Style::new().yellow().bold())
}

fn state_style(state: &CaptureSessionState) -> Style {
    match state {
        CaptureSessionState::Idle | CaptureSessionState::Stopping => Style::new().dimmed(),
        CaptureSessionState::Starting | CaptureSessionState::Reconfiguring => Style::new().yellow(),
        CaptureSessionState::Capturing => Style::new().green().bold(),
        CaptureSessionState::Failed(_) => Style::new().red().bold(),
    }
}

pub fn state(state: &CaptureSessionState) -> String {
    to(Target::Stdout, &state.to_string(), state_style(state))
}
