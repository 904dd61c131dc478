//! Editor surface: the text source the execution lifecycle reads from.

use std::fmt;

/// Shown when the shell starts without a file.
pub const STARTER_PROGRAM: &str = "# Welcome to the Natural Python editor!
# Try writing some commands like:

Make a number called x equal to 10
Print x
Add 5 to x
If x is bigger than 12, Print x
";

/// Zero-based line and column (in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

pub type ChangeListener = Box<dyn FnMut(&str) + Send>;

/// Contract consumed by the execution session.
pub trait EditorSurface {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    /// Cosmetic only; never part of a request.
    fn cursor(&self) -> Cursor;
    /// `listener` receives the full text after every edit.
    fn subscribe(&mut self, listener: ChangeListener);
}

/// Line-based text buffer edited by the TUI.
pub struct EditorBuffer {
    lines: Vec<String>,
    cursor: Cursor,
    /// First visible line, maintained by the renderer.
    pub scroll: usize,
    listeners: Vec<ChangeListener>,
}

impl fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorBuffer")
            .field("lines", &self.lines.len())
            .field("cursor", &self.cursor)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for EditorBuffer {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditorBuffer {
    pub fn new(text: &str) -> Self {
        Self {
            lines: split_lines(text),
            cursor: Cursor::default(),
            scroll: 0,
            listeners: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn current_line(&self) -> &str {
        &self.lines[self.cursor.line]
    }

    fn line_chars(&self, line: usize) -> usize {
        self.lines[line].chars().count()
    }

    fn byte_at(&self, line: usize, column: usize) -> usize {
        char_to_byte_index(&self.lines[line], column)
    }

    fn notify(&mut self) {
        let text = self.text();
        for listener in self.listeners.iter_mut() {
            listener(&text);
        }
    }

    // ----- editing -----

    pub fn insert_char(&mut self, c: char) {
        if c == '\n' {
            self.insert_newline();
            return;
        }
        let at = self.byte_at(self.cursor.line, self.cursor.column);
        self.lines[self.cursor.line].insert(at, c);
        self.cursor.column += 1;
        self.notify();
    }

    /// Insert arbitrary text (e.g. a paste) at the cursor.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let at = self.byte_at(self.cursor.line, self.cursor.column);
        let tail = self.lines[self.cursor.line].split_off(at);

        let mut pieces = text.split('\n');
        if let Some(first) = pieces.next() {
            self.lines[self.cursor.line].push_str(first);
        }
        for piece in pieces {
            self.cursor.line += 1;
            self.lines.insert(self.cursor.line, piece.to_string());
        }
        self.cursor.column = self.line_chars(self.cursor.line);
        self.lines[self.cursor.line].push_str(&tail);
        self.notify();
    }

    pub fn insert_newline(&mut self) {
        let at = self.byte_at(self.cursor.line, self.cursor.column);
        let tail = self.lines[self.cursor.line].split_off(at);
        self.cursor.line += 1;
        self.cursor.column = 0;
        self.lines.insert(self.cursor.line, tail);
        self.notify();
    }

    pub fn backspace(&mut self) {
        if self.cursor.column > 0 {
            self.cursor.column -= 1;
            let at = self.byte_at(self.cursor.line, self.cursor.column);
            self.lines[self.cursor.line].remove(at);
        } else if self.cursor.line > 0 {
            // Join with the previous line.
            let current = self.lines.remove(self.cursor.line);
            self.cursor.line -= 1;
            self.cursor.column = self.line_chars(self.cursor.line);
            self.lines[self.cursor.line].push_str(&current);
        } else {
            return;
        }
        self.notify();
    }

    pub fn delete(&mut self) {
        if self.cursor.column < self.line_chars(self.cursor.line) {
            let at = self.byte_at(self.cursor.line, self.cursor.column);
            self.lines[self.cursor.line].remove(at);
        } else if self.cursor.line + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor.line + 1);
            self.lines[self.cursor.line].push_str(&next);
        } else {
            return;
        }
        self.notify();
    }

    // ----- cursor movement -----

    pub fn move_left(&mut self) {
        if self.cursor.column > 0 {
            self.cursor.column -= 1;
        } else if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.cursor.column = self.line_chars(self.cursor.line);
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor.column < self.line_chars(self.cursor.line) {
            self.cursor.column += 1;
        } else if self.cursor.line + 1 < self.lines.len() {
            self.cursor.line += 1;
            self.cursor.column = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.cursor.column = self.cursor.column.min(self.line_chars(self.cursor.line));
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor.line + 1 < self.lines.len() {
            self.cursor.line += 1;
            self.cursor.column = self.cursor.column.min(self.line_chars(self.cursor.line));
        }
    }

    pub fn move_home(&mut self) {
        self.cursor.column = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor.column = self.line_chars(self.cursor.line);
    }

    /// Prefix of the cursor line up to the cursor, for width calculations.
    pub fn text_before_cursor(&self) -> &str {
        let at = self.byte_at(self.cursor.line, self.cursor.column);
        &self.current_line()[..at]
    }
}

impl EditorSurface for EditorBuffer {
    fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn set_text(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.cursor = Cursor::default();
        self.scroll = 0;
        self.notify();
    }

    fn cursor(&self) -> Cursor {
        self.cursor
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }
}

fn split_lines(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized.split('\n').map(str::to_string).collect()
}

/// Convert a character index (0-based) to a byte index in the given string.
/// If `n` exceeds the number of characters, returns `s.len()`.
fn char_to_byte_index(s: &str, n: usize) -> usize {
    match s.char_indices().nth(n) {
        Some((i, _)) => i,
        None => s.len(),
    }
}
