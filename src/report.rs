//! Operator-facing diagnostics.
//!
//! Batches describe what they did through a [`Reporter`] rather than the
//! process log, so a front end can show them however it likes.

use log::Level;
use std::io::Write;
use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    fn message(&self, level: Level, text: &str);

    /// Called after each processed item of a batch.
    fn progress(&self, current: usize, total: usize);

    fn info(&self, text: &str) {
        self.message(Level::Info, text);
    }

    fn warn(&self, text: &str) {
        self.message(Level::Warn, text);
    }

    fn error(&self, text: &str) {
        self.message(Level::Error, text);
    }
}

/// Forwards messages to the `log` facade and draws progress on stderr.
pub struct LogReporter {
    show_progress: bool,
}

impl LogReporter {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

impl Reporter for LogReporter {
    fn message(&self, level: Level, text: &str) {
        log::log!(level, "{}", text);
    }

    fn progress(&self, current: usize, total: usize) {
        if !self.show_progress || total == 0 {
            return;
        }
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r[{}/{}]", current, total);
        if current >= total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

/// Discards everything.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn message(&self, _level: Level, _text: &str) {}
    fn progress(&self, _current: usize, _total: usize) {}
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct RecordingReporter {
    messages: Mutex<Vec<(Level, String)>>,
    progress: Mutex<Vec<(usize, usize)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn last_progress(&self) -> Option<(usize, usize)> {
        self.progress.lock().ok().and_then(|p| p.last().copied())
    }
}

impl Reporter for RecordingReporter {
    fn message(&self, level: Level, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, text.to_string()));
        }
    }

    fn progress(&self, current: usize, total: usize) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.push((current, total));
        }
    }
}
