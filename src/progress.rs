//! Progress reporting for long-running operations such as loading large files.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use thiserror::Error;
use web_time::Instant;

/// Progress of one operation.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub message: String,
    started_at: Instant,
}

impl ProgressState {
    pub fn new() -> Self {
        Self {
            current: 0,
            total: 0,
            message: String::new(),
            started_at: Instant::now(),
        }
    }

    /// Completion in percent, capped at 100. Zero while the total is unknown.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current as f64 / self.total as f64 * 100.0).min(100.0)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Remaining time extrapolated from the rate so far.
    pub fn eta(&self) -> Option<Duration> {
        if self.current == 0 || self.total == 0 {
            return None;
        }
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let rate = self.current as f64 / elapsed;
        let remaining = self.total.saturating_sub(self.current) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives progress updates from an operation.
pub trait ProgressReporter {
    fn update(&mut self, current: usize, total: usize, message: &str);

    fn finish(&mut self, success: bool, message: &str);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Draws a progress bar on stderr through `indicatif`.
pub struct ConsoleReporter {
    bar: ProgressBar,
    state: ProgressState,
}

impl ConsoleReporter {
    const TEMPLATE: &'static str = "{prefix} [{bar:30.cyan/blue}] {percent:>3}% ETA {eta} {msg}";
    const TEMPLATE_NO_ETA: &'static str = "{prefix} [{bar:30.cyan/blue}] {percent:>3}% {msg}";

    pub fn new(title: impl Into<String>) -> Self {
        Self::with_draw_target(title, ProgressDrawTarget::stderr())
    }

    /// Reporter drawing to `target`. A hidden target keeps the bar state without output.
    pub fn with_draw_target(title: impl Into<String>, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        bar.set_style(Self::style(Self::TEMPLATE));
        bar.set_prefix(title.into());
        Self {
            bar,
            state: ProgressState::new(),
        }
    }

    pub fn without_eta(self) -> Self {
        self.bar.set_style(Self::style(Self::TEMPLATE_NO_ETA));
        self
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template).unwrap_or_else(|e| {
            log::warn!("Invalid progress template: {}", e);
            ProgressStyle::default_bar()
        })
    }
}

impl ProgressReporter for ConsoleReporter {
    fn update(&mut self, current: usize, total: usize, message: &str) {
        self.state.current = current;
        self.state.total = total;
        self.state.message = message.to_string();

        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
        self.bar.set_message(message.to_string());
    }

    fn finish(&mut self, success: bool, message: &str) {
        if success {
            let elapsed = self.state.elapsed().as_secs_f64();
            self.bar
                .finish_with_message(format!("completed in {:.1}s {}", elapsed, message).trim_end().to_string());
        } else {
            self.bar.abandon_with_message(format!("failed: {}", message));
        }
    }
}

/// Reports progress through the `log` facade in 10% steps.
pub struct LogReporter {
    title: String,
    state: ProgressState,
    last_decile: Option<u32>,
}

impl LogReporter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: ProgressState::new(),
            last_decile: None,
        }
    }
}

impl ProgressReporter for LogReporter {
    fn update(&mut self, current: usize, total: usize, message: &str) {
        self.state.current = current;
        self.state.total = total;
        let decile = (self.state.percent() / 10.0).floor() as u32;
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            log::info!("{}: {:.0}% {}", self.title, self.state.percent(), message);
        }
    }

    fn finish(&mut self, success: bool, message: &str) {
        let elapsed = self.state.elapsed().as_secs_f64();
        if success {
            log::info!("{} completed in {:.1}s {}", self.title, elapsed, message);
        } else {
            log::warn!("{} failed after {:.1}s {}", self.title, elapsed, message);
        }
    }
}

/// Discards updates. Can be cancelled by the caller.
#[derive(Default)]
pub struct SilentReporter {
    pub state: ProgressState,
    pub finished: Option<bool>,
    cancelled: bool,
}

impl SilentReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl ProgressReporter for SilentReporter {
    fn update(&mut self, current: usize, total: usize, message: &str) {
        self.state.current = current;
        self.state.total = total;
        self.state.message = message.to_string();
    }

    fn finish(&mut self, success: bool, _message: &str) {
        self.finished = Some(success);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Which reporter to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReporterKind {
    /// Console bar when stderr is a terminal, log messages otherwise
    #[default]
    Auto,
    Console,
    Log,
    Silent,
}

pub fn create_reporter(title: &str, kind: ReporterKind) -> Box<dyn ProgressReporter> {
    match kind {
        ReporterKind::Auto if std::io::stderr().is_terminal() => Box::new(ConsoleReporter::new(title)),
        ReporterKind::Auto | ReporterKind::Log => Box::new(LogReporter::new(title)),
        ReporterKind::Console => Box::new(ConsoleReporter::new(title)),
        ReporterKind::Silent => Box::new(SilentReporter::new()),
    }
}

/// Run `f` with a fresh reporter and finish it according to the result.
pub fn with_progress<T, E: std::fmt::Display>(
    title: &str,
    kind: ReporterKind,
    f: impl FnOnce(&mut dyn ProgressReporter) -> Result<T, E>,
) -> Result<T, E> {
    let mut reporter = create_reporter(title, kind);
    let result = f(reporter.as_mut());
    match &result {
        Ok(_) => reporter.finish(true, ""),
        Err(e) => reporter.finish(false, &format!("Error: {}", e)),
    }
    result
}

/// Returned by a progress callback once the user cancelled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation cancelled by user")]
pub struct Cancelled;

/// Callback forwarding updates to `reporter` and checking for cancellation.
pub fn progress_callback<'a>(
    reporter: &'a mut dyn ProgressReporter,
) -> impl FnMut(usize, usize, &str) -> Result<(), Cancelled> + 'a {
    move |current: usize, total: usize, message: &str| {
        reporter.update(current, total, message);
        if reporter.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Rough processing time in seconds for a file at `mb_per_sec`.
pub fn estimate_file_processing_time(file_size_bytes: u64, mb_per_sec: f64) -> f64 {
    let size_mb = file_size_bytes as f64 / (1024.0 * 1024.0);
    size_mb / mb_per_sec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let mut state = ProgressState::new();
        assert_eq!(state.percent(), 0.0);
        assert!(state.eta().is_none());

        state.total = 4;
        state.current = 1;
        assert_eq!(state.percent(), 25.0);
        state.current = 9;
        assert_eq!(state.percent(), 100.0);
    }

    #[test]
    fn test_console_reporter_tracks_bar() {
        let mut reporter = ConsoleReporter::with_draw_target("Loading", ProgressDrawTarget::hidden());
        reporter.update(3, 10, "annotations");
        assert_eq!(reporter.bar.length(), Some(10));
        assert_eq!(reporter.bar.position(), 3);
        assert_eq!(reporter.state.message, "annotations");
        assert!(!reporter.bar.is_finished());

        reporter.finish(true, "");
        assert!(reporter.bar.is_finished());
    }

    #[test]
    fn test_console_reporter_without_eta_keeps_state() {
        let mut reporter =
            ConsoleReporter::with_draw_target("Loading", ProgressDrawTarget::hidden()).without_eta();
        reporter.update(10, 10, "");
        assert_eq!(reporter.bar.position(), 10);
        assert_eq!(reporter.state.percent(), 100.0);

        reporter.finish(false, "boom");
        assert!(reporter.bar.is_finished());
    }

    #[test]
    fn test_estimate_processing_time() {
        assert_eq!(estimate_file_processing_time(20 * 1024 * 1024, 10.0), 2.0);
    }

    #[test]
    fn test_callback_reports_cancellation() {
        let mut reporter = SilentReporter::new();
        {
            let mut callback = progress_callback(&mut reporter);
            assert_eq!(callback(1, 10, "step"), Ok(()));
        }
        assert_eq!(reporter.state.current, 1);

        reporter.cancel();
        let mut callback = progress_callback(&mut reporter);
        assert_eq!(callback(2, 10, "step"), Err(Cancelled));
    }

    #[test]
    fn test_with_progress_passes_result_through() {
        let ok: Result<u32, String> = with_progress("test", ReporterKind::Silent, |reporter| {
            reporter.update(1, 1, "done");
            Ok(7)
        });
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            with_progress("test", ReporterKind::Silent, |_| Err("boom".to_string()));
        assert_eq!(err, Err("boom".to_string()));
    }
}
