//! The single channel for user-facing status, progress, warnings and errors.
//!
//! Core components never print directly. They receive a `&dyn Notifier` and
//! route every line through it, so quiet mode, terminal handling and tests
//! all hook in at one place.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::download::ProgressUpdate;

/// Sink for human-readable run output.
pub trait Notifier: Send + Sync {
    /// Status line (suppressed in quiet mode).
    fn to_screen(&self, message: &str);

    /// Progress of the running transfer (suppressed in quiet mode).
    fn progress(&self, update: &ProgressUpdate);

    /// Ends the current progress display.
    fn progress_done(&self);

    /// Output the user explicitly asked for (forced title/url); never suppressed.
    fn forced(&self, message: &str);

    /// Warning line (always shown, error stream).
    fn warning(&self, message: &str);

    /// Error line (always shown, error stream).
    fn error(&self, message: &str);
}

/// Console notifier: status and progress on stdout, problems on stderr.
///
/// On a terminal progress is an indicatif line; otherwise each update is
/// written as `\r<line>` and terminated by `progress_done`.
#[derive(Debug)]
pub struct ConsoleNotifier {
    quiet: bool,
    bar: Mutex<Option<ProgressBar>>,
    plain_line_open: AtomicBool,
}

impl ConsoleNotifier {
    /// Creates a console notifier.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: Mutex::new(None),
            plain_line_open: AtomicBool::new(false),
        }
    }

    fn plain_progress(&self, out: &mut impl Write, update: &ProgressUpdate) {
        let _ = write!(out, "\r{update}");
        let _ = out.flush();
        self.plain_line_open.store(true, Ordering::Relaxed);
    }

    fn plain_progress_done(&self, out: &mut impl Write) {
        if self.plain_line_open.swap(false, Ordering::Relaxed) {
            let _ = writeln!(out);
        }
    }

    fn with_bar<F>(&self, f: F)
    where
        F: FnOnce(&mut Option<ProgressBar>),
    {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    fn new_bar() -> ProgressBar {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
        bar.set_style(
            ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}

impl Notifier for ConsoleNotifier {
    fn to_screen(&self, message: &str) {
        if self.quiet {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{message}");
    }

    fn progress(&self, update: &ProgressUpdate) {
        if self.quiet {
            return;
        }
        if !io::stdout().is_terminal() {
            self.plain_progress(&mut io::stdout().lock(), update);
            return;
        }
        self.with_bar(|bar| {
            bar.get_or_insert_with(Self::new_bar)
                .set_message(update.to_string());
        });
    }

    fn progress_done(&self) {
        self.plain_progress_done(&mut io::stdout().lock());
        self.with_bar(|bar| {
            if let Some(bar) = bar.take() {
                bar.finish();
            }
        });
    }

    fn forced(&self, message: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{message}");
    }

    fn warning(&self, message: &str) {
        self.with_bar(|bar| {
            if let Some(bar) = bar.as_ref() {
                bar.suspend(|| eprintln!("WARNING: {message}"));
            } else {
                eprintln!("WARNING: {message}");
            }
        });
    }

    fn error(&self, message: &str) {
        self.with_bar(|bar| {
            if let Some(bar) = bar.as_ref() {
                bar.suspend(|| eprintln!("ERROR: {message}"));
            } else {
                eprintln!("ERROR: {message}");
            }
        });
    }
}

/// Severity of a recorded notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// `to_screen` output.
    Status,
    /// Final rendering of a transfer's progress.
    Progress,
    /// `forced` output.
    Forced,
    /// `warning` output.
    Warning,
    /// `error` output.
    Error,
}

/// One recorded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Rendered message.
    pub message: String,
}

/// Notifier that keeps every line in memory, for embedding and tests.
///
/// Progress updates are collapsed: only the most recent one per transfer is
/// kept, committed as a [`NoticeLevel::Progress`] notice on `progress_done`.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
    last_progress: Mutex<Option<ProgressUpdate>>,
}

impl MemoryNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the messages recorded at `level`.
    #[must_use]
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter(|notice| notice.level == level)
            .map(|notice| notice.message)
            .collect()
    }

    /// Returns the most recent progress update seen, if any.
    #[must_use]
    pub fn last_progress(&self) -> Option<ProgressUpdate> {
        *self
            .last_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                level,
                message: message.to_string(),
            });
    }
}

impl Notifier for MemoryNotifier {
    fn to_screen(&self, message: &str) {
        self.push(NoticeLevel::Status, message);
    }

    fn progress(&self, update: &ProgressUpdate) {
        *self
            .last_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(*update);
    }

    fn progress_done(&self) {
        if let Some(update) = self.last_progress() {
            self.push(NoticeLevel::Progress, &update.to_string());
        }
    }

    fn forced(&self, message: &str) {
        self.push(NoticeLevel::Forced, message);
    }

    fn warning(&self, message: &str) {
        self.push(NoticeLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(NoticeLevel::Error, message);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_memory_notifier_records_levels_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.to_screen("hello");
        notifier.warning("careful");
        notifier.error("broken");
        notifier.forced("Title");

        let levels: Vec<NoticeLevel> = notifier.notices().iter().map(|n| n.level).collect();
        assert_eq!(
            levels,
            vec![
                NoticeLevel::Status,
                NoticeLevel::Warning,
                NoticeLevel::Error,
                NoticeLevel::Forced
            ]
        );
        assert_eq!(notifier.messages(NoticeLevel::Error), vec!["broken"]);
    }

    #[test]
    fn test_memory_notifier_collapses_progress() {
        let notifier = MemoryNotifier::new();
        for downloaded in [10, 20, 30] {
            notifier.progress(&ProgressUpdate {
                downloaded,
                total: Some(30),
                elapsed: Duration::from_secs(1),
            });
        }
        notifier.progress_done();

        let progress = notifier.messages(NoticeLevel::Progress);
        assert_eq!(progress.len(), 1);
        assert!(progress[0].contains("100.0%"), "got {}", progress[0]);
        assert_eq!(notifier.last_progress().unwrap().downloaded, 30);
    }

    #[test]
    fn test_console_notifier_quiet_progress_is_noop() {
        let notifier = ConsoleNotifier::new(true);
        notifier.progress(&ProgressUpdate {
            downloaded: 1,
            total: None,
            elapsed: Duration::from_secs(1),
        });
        notifier.progress_done();
        assert!(notifier.bar.lock().unwrap().is_none());
        assert!(!notifier.plain_line_open.load(Ordering::Relaxed));
    }

    #[test]
    fn test_console_notifier_plain_progress_rewrites_one_line() {
        let notifier = ConsoleNotifier::new(false);
        let mut out = Vec::new();
        for downloaded in [50, 100] {
            notifier.plain_progress(
                &mut out,
                &ProgressUpdate {
                    downloaded,
                    total: Some(100),
                    elapsed: Duration::from_secs(1),
                },
            );
        }
        notifier.plain_progress_done(&mut out);
        notifier.plain_progress_done(&mut out);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\r[download]"), "got {text:?}");
        assert_eq!(text.matches('\r').count(), 2);
        assert!(text.contains("100.0%"), "got {text:?}");
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
    }
}
