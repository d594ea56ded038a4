//! Download progress reporting.
//!
//! Progress is observability only; nothing reads it back for flow control.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Receives progress for one file download.
pub trait ProgressObserver: Send + Sync {
    /// Called after every chunk when the response declared a total size.
    fn on_progress(&self, percent: f64);

    /// Called once when the download ends.
    fn on_finish(&self, _success: bool) {}
}

/// Percentage of `total` transferred, `(transferred / total) * 100`.
///
/// Returns `None` for an unknown or zero total.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress_percent(transferred: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some((transferred as f64 / total as f64) * 100.0),
        _ => None,
    }
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _percent: f64) {}
}

/// Observer that logs progress at `debug` level in 10% steps.
///
/// Used when no bar is drawn, so logs still carry the percentages.
#[derive(Debug)]
pub struct LogProgress {
    label: String,
    next_step: AtomicU64,
}

impl LogProgress {
    /// Creates an observer for the file named `label`.
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            next_step: AtomicU64::new(0),
        }
    }

    /// Whether a percentage crosses the next unlogged 10% step.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn crosses_step(&self, percent: f64) -> bool {
        let step = (percent.clamp(0.0, 100.0) / 10.0).floor() as u64;
        let next = self.next_step.load(Ordering::Relaxed);
        if step < next {
            return false;
        }
        self.next_step.store(step + 1, Ordering::Relaxed);
        true
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&self, percent: f64) {
        if self.crosses_step(percent) {
            debug!(file = %self.label, percent = percent.round(), "download progress");
        }
    }

    fn on_finish(&self, success: bool) {
        debug!(file = %self.label, success, "download finished");
    }
}

/// One terminal progress bar on a 0-100 scale.
pub struct TerminalProgress {
    bar: ProgressBar,
}

impl std::fmt::Debug for TerminalProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalProgress")
            .field("position", &self.bar.position())
            .finish()
    }
}

impl TerminalProgress {
    /// Creates a bar labelled with `label`.
    #[must_use]
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(label.to_string());
        Self { bar }
    }
}

impl ProgressObserver for TerminalProgress {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_progress(&self, percent: f64) {
        self.bar.set_position(percent.clamp(0.0, 100.0) as u64);
    }

    fn on_finish(&self, success: bool) {
        if success {
            self.bar.finish();
        } else {
            self.bar.abandon();
        }
    }
}

/// Whether downloads draw terminal progress bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDisplay {
    /// One bar per file.
    Terminal,
    /// No bars; percentages go to the `debug` log.
    Hidden,
}

impl ProgressDisplay {
    /// Creates the observer for one file download.
    #[must_use]
    pub fn observer(self, label: &str) -> Box<dyn ProgressObserver> {
        match self {
            Self::Terminal => Box::new(TerminalProgress::new(label)),
            Self::Hidden => Box::new(LogProgress::new(label)),
        }
    }
}
