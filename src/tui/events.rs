//! Custom event types for TUI application.

use crossterm::event::KeyEvent;

/// Terminal-side events. Lifecycle events travel on the session's own channel.
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Terminal was resized; redraw only
    Resize,
    /// Editor text changed (delivered by the editor's change subscription)
    EditorChanged { lines: usize },
}
