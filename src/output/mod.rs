//! Output sinks: where a run's single terminal result is shown.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::execution::ExecutionResult;

pub const IN_PROGRESS_TEXT: &str = "Running...";

/// Receives exactly one `render` per accepted run, preceded by `begin_run`.
pub trait OutputSink {
    /// A run was accepted; stale output should no longer be shown.
    fn begin_run(&mut self);
    /// Replace whatever is displayed with `result`.
    fn render(&mut self, result: &ExecutionResult);
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputContent {
    #[default]
    Empty,
    InProgress,
    Success(String),
    Failure(String),
}

/// Output pane model for the TUI.
#[derive(Debug, Default)]
pub struct OutputPanel {
    content: OutputContent,
    /// Scroll offset in lines from the top.
    pub scroll: u16,
}

impl OutputPanel {
    pub fn content(&self) -> &OutputContent {
        &self.content
    }

    /// Text to display for the current content.
    pub fn text(&self) -> &str {
        match &self.content {
            OutputContent::Empty => "",
            OutputContent::InProgress => IN_PROGRESS_TEXT,
            OutputContent::Success(s) | OutputContent::Failure(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.content, OutputContent::Failure(_))
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    /// The renderer pulls this back with [`Self::clamp_scroll`] once it knows
    /// how many rows the wrapped text takes.
    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }

    pub fn clamp_scroll(&mut self, max: u16) {
        self.scroll = self.scroll.min(max);
    }

    pub fn clear(&mut self) {
        self.content = OutputContent::Empty;
        self.scroll = 0;
    }
}

impl OutputSink for OutputPanel {
    fn begin_run(&mut self) {
        self.content = OutputContent::InProgress;
        self.scroll = 0;
    }

    fn render(&mut self, result: &ExecutionResult) {
        self.content = match result {
            ExecutionResult::Success { output } => OutputContent::Success(output.clone()),
            ExecutionResult::Failure { message } => OutputContent::Failure(message.clone()),
        };
        self.scroll = 0;
    }
}

const PROGRESS_BAR_WIDTH: usize = 20;

/// One-shot sink for `--run`: output to stdout verbatim, failures to stderr.
///
/// A failed write to either stream counts as a failed run, so a broken pipe
/// never turns into a silent exit 0.
pub struct TerminalPrinter<O = io::Stdout, E = io::Stderr> {
    pub color: bool,
    progress_line: bool,
    progress_drawn: bool,
    out: O,
    err: E,
    failed: Option<bool>,
}

impl TerminalPrinter {
    pub fn new(color: bool) -> Self {
        Self::with_writers(io::stdout(), io::stderr(), color)
    }
}

impl<O: Write, E: Write> TerminalPrinter<O, E> {
    pub fn with_writers(out: O, err: E, color: bool) -> Self {
        Self {
            color,
            progress_line: false,
            progress_drawn: false,
            out,
            err,
            failed: None,
        }
    }

    /// Draw a `\r`-refreshed progress bar on the error stream while running.
    pub fn with_progress_line(mut self, enabled: bool) -> Self {
        self.progress_line = enabled;
        self
    }

    /// `None` until a result has been rendered.
    pub fn failed(&self) -> Option<bool> {
        self.failed
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    pub fn show_progress(&mut self, value: u8) {
        if !self.progress_line {
            return;
        }
        let filled = usize::from(value.min(100)) * PROGRESS_BAR_WIDTH / 100;
        let line = format!(
            "\r[{}{}] {value}% Complete",
            "#".repeat(filled),
            ".".repeat(PROGRESS_BAR_WIDTH - filled)
        );
        // Cosmetic; a failure here must not affect the result.
        let _ = self.err.write_all(line.as_bytes()).and_then(|_| self.err.flush());
        self.progress_drawn = true;
    }

    fn clear_progress(&mut self) {
        if self.progress_drawn {
            let _ = self.err.write_all(b"\r\x1b[2K").and_then(|_| self.err.flush());
            self.progress_drawn = false;
        }
    }

    fn write_output(&mut self, output: &str) -> io::Result<()> {
        self.out.write_all(output.as_bytes())?;
        self.out.flush()
    }

    fn write_failure(&mut self, message: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.err, "{}", message.red())?;
        } else {
            writeln!(self.err, "{message}")?;
        }
        self.err.flush()
    }
}

impl<O: Write, E: Write> OutputSink for TerminalPrinter<O, E> {
    fn begin_run(&mut self) {
        self.failed = None;
        self.show_progress(0);
    }

    fn render(&mut self, result: &ExecutionResult) {
        self.clear_progress();
        let written = match result {
            ExecutionResult::Success { output } => self.write_output(output),
            ExecutionResult::Failure { message } => self.write_failure(message),
        };
        self.failed = Some(match written {
            Ok(()) => !result.is_success(),
            Err(e) => {
                tracing::error!(error = %e, "failed to write run result");
                true
            }
        });
    }
}
