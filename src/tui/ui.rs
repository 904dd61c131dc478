//! UI layout and rendering logic for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::App;
use super::theme::Palette;
use crate::editor::EditorSurface;
use crate::execution::ExecutionTransport;
use crate::output::OutputContent;

/// Render the main UI
pub fn render_ui<T: ExecutionTransport>(frame: &mut Frame, app: &mut App<T>) {
    let palette = app.theme.palette();

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        frame.area(),
    );

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Editor + output
            Constraint::Length(1), // Run bar
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    if app.show_output {
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(main_layout[0]);
        render_editor(frame, app, panes[0], &palette);
        render_output(frame, app, panes[1], &palette);
    } else {
        render_editor(frame, app, main_layout[0], &palette);
    }

    render_run_bar(frame, app, main_layout[1], &palette);
    render_status_bar(frame, app, main_layout[2], &palette);

    if app.show_help {
        render_help_overlay(frame, &palette);
    }
}

/// Editor pane with a line-number gutter. Keeps the cursor line in view.
fn render_editor<T: ExecutionTransport>(
    frame: &mut Frame,
    app: &mut App<T>,
    area: Rect,
    palette: &Palette,
) {
    let title = match &app.file_name {
        Some(name) if app.modified => format!("Write your code here: {name} [+]"),
        Some(name) => format!("Write your code here: {name}"),
        None => "Write your code here:".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(
            Style::default()
                .fg(palette.editor_title)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let height = inner.height as usize;
    let cursor = app.editor.cursor();
    if height > 0 {
        if cursor.line < app.editor.scroll {
            app.editor.scroll = cursor.line;
        } else if cursor.line >= app.editor.scroll + height {
            app.editor.scroll = cursor.line + 1 - height;
        }
    }

    let gutter_width = app.editor.line_count().to_string().len().max(2) + 1;
    let lines: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .enumerate()
        .skip(app.editor.scroll)
        .take(height)
        .map(|(i, text)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>width$} ", i + 1, width = gutter_width - 1),
                    Style::default().fg(palette.gutter),
                ),
                Span::styled(text.clone(), Style::default().fg(palette.text)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(Text::from(lines)), inner);

    if !app.show_help {
        let x = inner.x as usize + gutter_width + app.editor.text_before_cursor().width();
        let y = inner.y as usize + cursor.line.saturating_sub(app.editor.scroll);
        let max_x = (inner.x + inner.width).saturating_sub(1) as usize;
        frame.set_cursor_position((x.min(max_x) as u16, y as u16));
    }
}

/// Output pane. Scroll is clamped against the wrapped height so the last row
/// of any output can always be reached.
fn render_output<T: ExecutionTransport>(
    frame: &mut Frame,
    app: &mut App<T>,
    area: Rect,
    palette: &Palette,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("See what happens:")
        .title_style(
            Style::default()
                .fg(palette.output_title)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);

    let panel = app.session.sink_mut();
    let rows = Paragraph::new(panel.text())
        .wrap(Wrap { trim: false })
        .line_count(inner.width);
    let max_scroll = rows.saturating_sub(usize::from(inner.height));
    panel.clamp_scroll(u16::try_from(max_scroll).unwrap_or(u16::MAX));

    let panel = app.session.sink();
    let style = match panel.content() {
        OutputContent::Empty | OutputContent::Success(_) => Style::default().fg(palette.success),
        OutputContent::InProgress => Style::default()
            .fg(palette.pending)
            .add_modifier(Modifier::ITALIC),
        OutputContent::Failure(_) => Style::default().fg(palette.failure),
    };

    let paragraph = Paragraph::new(panel.text())
        .style(style)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((panel.scroll, 0));

    frame.render_widget(paragraph, area);
}

/// Run button label and the synthetic progress gauge.
fn render_run_bar<T: ExecutionTransport>(
    frame: &mut Frame,
    app: &App<T>,
    area: Rect,
    palette: &Palette,
) {
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(16), Constraint::Min(10)])
        .split(area);

    let running = app.session.is_running();
    let (label, label_style) = if running {
        (" Running... ", Style::default().fg(palette.pending))
    } else {
        (
            " [ Run Code! ] ",
            Style::default()
                .fg(palette.output_title)
                .add_modifier(Modifier::BOLD),
        )
    };
    frame.render_widget(Paragraph::new(label).style(label_style), parts[0]);

    let value = app.session.progress().value();
    let gauge_label = if running || value > 0 {
        format!("{value}% Complete")
    } else {
        String::new()
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(palette.gauge).bg(palette.status_bg))
        .percent(u16::from(value))
        .label(gauge_label);
    frame.render_widget(gauge, parts[1]);
}

/// Render the status bar
fn render_status_bar<T: ExecutionTransport>(
    frame: &mut Frame,
    app: &App<T>,
    area: Rect,
    palette: &Palette,
) {
    let cursor = app.editor.cursor();
    let status_text = format!(
        "{} | Ln {}, Col {} | {} lines | {} | {}",
        app.status_message,
        cursor.line + 1,
        cursor.column + 1,
        app.line_count,
        app.session.endpoint(),
        app.theme.name(),
    );

    let status_paragraph = Paragraph::new(status_text)
        .style(Style::default().bg(palette.status_bg).fg(palette.status_fg));

    frame.render_widget(status_paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, palette: &Palette) {
    let area = frame.area();

    // Create centered popup area
    let popup_area = centered_rect(70, 70, area);

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Natural Python Editor Help"),
        Line::from(""),
        Line::from("Run:"),
        Line::from("  Ctrl+R / F5  - Run the editor contents"),
        Line::from("  Ctrl+L       - Clear output"),
        Line::from("  PgUp/PgDn    - Scroll output"),
        Line::from(""),
        Line::from("View:"),
        Line::from("  F1           - Toggle this help"),
        Line::from("  F2           - Toggle dark/light theme"),
        Line::from("  F3           - Show/hide output pane"),
        Line::from(""),
        Line::from("Quit:"),
        Line::from("  Ctrl+Q       - Quit"),
        Line::from("  Ctrl+C x2    - Quit"),
        Line::from(""),
        Line::from("Example:"),
        Line::from("  Make a number called x equal to 10"),
        Line::from("  Print x"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(
                    Style::default()
                        .fg(palette.pending)
                        .add_modifier(Modifier::BOLD),
                ),
        )
        .style(Style::default().bg(palette.background).fg(palette.text))
        .wrap(Wrap { trim: true });

    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::EditorBuffer;
    use crate::execution::{
        ExecutionError, ExecutionRequest, ExecutionResult, ExecutionSession, ProgressSettings,
        RawResponse,
    };
    use crate::output::{OutputPanel, OutputSink};
    use crate::tui::theme::Theme;
    use async_trait::async_trait;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    struct Offline;

    #[async_trait]
    impl ExecutionTransport for Offline {
        async fn execute(
            &self,
            _request: &ExecutionRequest,
        ) -> Result<RawResponse, ExecutionError> {
            Err(ExecutionError::transport("offline"))
        }

        fn endpoint(&self) -> &str {
            "offline://"
        }
    }

    fn app_with_output(output: &str) -> App<Offline> {
        let (tui_tx, _tui_rx) = mpsc::unbounded_channel();
        let (life_tx, _life_rx) = mpsc::unbounded_channel();
        let mut session = ExecutionSession::new(
            Offline,
            OutputPanel::default(),
            ProgressSettings::default(),
            life_tx,
        );
        session.sink_mut().render(&ExecutionResult::Success {
            output: output.to_string(),
        });
        App::new(EditorBuffer::new(""), session, None, Theme::Dark, tui_tx)
    }

    fn screen_rows(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    #[test]
    fn end_of_wrapped_output_can_be_scrolled_into_view() {
        // One logical line that wraps far past the pane height.
        let mut output = "lorem ipsum dolor sit amet ".repeat(15);
        output.push_str("TAILMARK");
        let mut app = app_with_output(&output);
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();

        terminal.draw(|frame| render_ui(frame, &mut app)).unwrap();
        assert!(!screen_rows(&terminal).iter().any(|r| r.contains("TAILMARK")));

        for _ in 0..100 {
            app.session.sink_mut().scroll_down();
        }
        terminal.draw(|frame| render_ui(frame, &mut app)).unwrap();

        assert!(app.session.sink().scroll > 0);
        assert!(app.session.sink().scroll < 100);
        assert!(
            screen_rows(&terminal).iter().any(|r| r.contains("TAILMARK")),
            "tail not visible after scrolling: {:#?}",
            screen_rows(&terminal)
        );

        // Clamped, so a single step back moves the view.
        let bottom = app.session.sink().scroll;
        app.session.sink_mut().scroll_up();
        assert_eq!(app.session.sink().scroll, bottom - 1);
    }

    #[test]
    fn short_output_does_not_scroll() {
        let mut app = app_with_output("hi\n");
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        for _ in 0..5 {
            app.session.sink_mut().scroll_down();
        }
        terminal.draw(|frame| render_ui(frame, &mut app)).unwrap();
        assert_eq!(app.session.sink().scroll, 0);
        assert!(screen_rows(&terminal).iter().any(|r| r.contains("hi")));
    }
}
