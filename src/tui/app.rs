//! TUI application state management.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;

use super::events::TuiEvent;
use super::theme::Theme;
use crate::editor::{EditorBuffer, EditorSurface};
use crate::execution::{
    ExecutionSession, ExecutionTransport, HttpTransport, LifecycleEvent, SubmitOutcome,
};
use crate::output::OutputPanel;

const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);
const TAB: &str = "    ";

/// What the event loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Application state for the TUI
pub struct App<T = HttpTransport> {
    pub editor: EditorBuffer,
    pub session: ExecutionSession<T, OutputPanel>,
    /// Name shown in the editor title
    pub file_name: Option<String>,
    pub theme: Theme,
    /// Whether the output pane is visible
    pub show_output: bool,
    pub show_help: bool,
    /// Line count as last reported by the editor's change subscription
    pub line_count: usize,
    /// Edited since the shell started
    pub modified: bool,
    pub status_message: String,
    /// Timestamp of last Ctrl+C press for double Ctrl+C detection
    pub last_ctrl_c_time: Option<Instant>,
}

impl<T: ExecutionTransport> App<T> {
    /// `events` receives the editor's change notifications.
    pub fn new(
        mut editor: EditorBuffer,
        session: ExecutionSession<T, OutputPanel>,
        file_name: Option<String>,
        theme: Theme,
        events: UnboundedSender<TuiEvent>,
    ) -> Self {
        editor.subscribe(Box::new(move |text: &str| {
            let lines = text.split('\n').count();
            let _ = events.send(TuiEvent::EditorChanged { lines });
        }));
        let line_count = editor.line_count();

        Self {
            editor,
            session,
            file_name,
            theme,
            show_output: true,
            show_help: false,
            line_count,
            modified: false,
            status_message: idle_status().to_string(),
            last_ctrl_c_time: None,
        }
    }

    pub fn handle_event(&mut self, event: TuiEvent) -> Flow {
        match event {
            TuiEvent::Key(key) => self.handle_key(key),
            TuiEvent::Paste(text) => {
                self.editor.insert_str(&text);
                Flow::Continue
            }
            TuiEvent::Resize => Flow::Continue,
            TuiEvent::EditorChanged { lines } => {
                self.line_count = lines;
                self.modified = true;
                Flow::Continue
            }
        }
    }

    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        if self.session.handle(event) {
            let outcome = if self.session.sink().is_failure() {
                "Run failed"
            } else {
                "Run finished"
            };
            self.status_message = format!("{outcome} | {}", idle_status());
        }
    }

    /// Start a run from the current editor text. A second trigger while one
    /// is in flight changes nothing.
    pub fn run(&mut self) {
        if let SubmitOutcome::Started(run) = self.session.trigger(&self.editor) {
            self.status_message = format!("Running #{run}...");
            self.show_output = true;
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub fn toggle_output(&mut self) {
        self.show_output = !self.show_output;
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }

        // If help is shown, any key closes it
        if self.show_help {
            self.show_help = false;
            return Flow::Continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                if self.handle_ctrl_c() {
                    return Flow::Quit;
                }
            }
            KeyCode::Char('q') if ctrl => return Flow::Quit,
            KeyCode::Char('r') if ctrl => self.run(),
            KeyCode::F(5) => self.run(),
            KeyCode::Char('l') if ctrl => {
                if !self.session.is_running() {
                    self.session.sink_mut().clear();
                }
            }
            KeyCode::F(1) => self.toggle_help(),
            KeyCode::F(2) => self.toggle_theme(),
            KeyCode::F(3) => self.toggle_output(),
            KeyCode::PageUp => self.session.sink_mut().scroll_up(),
            KeyCode::PageDown => self.session.sink_mut().scroll_down(),
            KeyCode::Up => self.editor.move_up(),
            KeyCode::Down => self.editor.move_down(),
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Home => self.editor.move_home(),
            KeyCode::End => self.editor.move_end(),
            KeyCode::Enter => self.editor.insert_newline(),
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Delete => self.editor.delete(),
            KeyCode::Tab => self.editor.insert_str(TAB),
            KeyCode::Char(c) if !ctrl => self.editor.insert_char(c),
            _ => {}
        }
        Flow::Continue
    }

    /// Handle Ctrl+C press and detect double press for quit
    /// Returns true if should quit (double Ctrl+C), false otherwise
    fn handle_ctrl_c(&mut self) -> bool {
        let now = Instant::now();

        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        self.last_ctrl_c_time = Some(now);
        self.status_message = "Press Ctrl+C again to quit".to_string();
        false
    }
}

fn idle_status() -> &'static str {
    "Ctrl+R run | F1 help"
}
