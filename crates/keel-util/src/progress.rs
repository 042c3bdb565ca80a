//! Terminal feedback for lock runs.
//!
//! Every line goes to stderr so `Keel.lock` contents or check reports on
//! stdout stay clean. Labels are right-aligned in a 12 column gutter:
//!
//! ```text
//!       Locked 6 specs in Keel.lock
//!        Fresh Keel.lock is up to date
//!      Missing rack-1.2.1
//! ```

use std::io::Write;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

const GUTTER: usize = 12;

#[derive(Debug, Clone, Copy)]
enum Tone {
    Action,
    Info,
    Warn,
}

impl Tone {
    fn style(self) -> Style {
        let style = Style::new().for_stderr().bold();
        match self {
            Tone::Action => style.green(),
            Tone::Info => style.cyan(),
            Tone::Warn => style.yellow(),
        }
    }
}

fn render(tone: Tone, label: &str, message: &str) -> String {
    format!(
        "{:>width$} {message}",
        tone.style().apply_to(label),
        width = GUTTER
    )
}

fn emit(tone: Tone, label: &str, message: &str) {
    let _ = writeln!(std::io::stderr(), "{}", render(tone, label, message));
}

/// Something changed on disk: `Locked`, `Adding`.
pub fn status(label: &str, message: &str) {
    emit(Tone::Action, label, message);
}

/// Nothing needed doing, or a change is only being reported.
pub fn status_info(label: &str, message: &str) {
    emit(Tone::Info, label, message);
}

pub fn status_warn(label: &str, message: &str) {
    emit(Tone::Warn, label, message);
}

/// Spinner shown while sources are fetched and the solver runs.
///
/// Callers clear it with [`ProgressBar::finish_and_clear`] before printing
/// any status line.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
