//! Async event loop for the interactive editor.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;

use super::{
    app::{App, Flow},
    events::TuiEvent,
    theme::Theme,
    ui::render_ui,
};
use crate::config::Config;
use crate::editor::EditorBuffer;
use crate::execution::{ExecutionSession, HttpTransport, LifecycleEvent};
use crate::output::OutputPanel;

/// Run the interactive editor until the user quits.
pub async fn run_tui(
    cfg: &Config,
    initial_text: &str,
    file_name: Option<String>,
    theme: Theme,
) -> Result<()> {
    // Check if we're in a proper terminal environment
    if !io::IsTerminal::is_terminal(&io::stdout()) {
        return Err(anyhow::anyhow!(
            "interactive mode requires a terminal; use --run for scripts"
        ));
    }

    let transport = HttpTransport::from_config(cfg)?;
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel::<LifecycleEvent>();
    let session = ExecutionSession::new(
        transport,
        OutputPanel::default(),
        cfg.progress_settings(),
        lifecycle_tx,
    );
    let mut app = App::new(
        EditorBuffer::new(initial_text),
        session,
        file_name,
        theme,
        event_tx.clone(),
    );

    // Setup terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    tracing::info!(endpoint = app.session.endpoint(), "editor started");
    let result = run_app(&mut terminal, &mut app, event_tx, event_rx, lifecycle_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    tracing::info!("editor closed");

    result
}

/// Main application loop. Terminal input, editor notifications and lifecycle
/// events are all handled here, one at a time.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    mut event_rx: mpsc::UnboundedReceiver<TuiEvent>,
    mut lifecycle_rx: mpsc::UnboundedReceiver<LifecycleEvent>,
) -> Result<()> {
    spawn_input_reader(event_tx);

    loop {
        terminal.draw(|frame| render_ui(frame, app))?;

        tokio::select! {
            ev = event_rx.recv() => {
                let Some(ev) = ev else { break };
                if app.handle_event(ev) == Flow::Quit {
                    break;
                }
            }
            Some(ev) = lifecycle_rx.recv() => {
                app.handle_lifecycle(ev);
            }
        }
    }

    if app.session.is_running() {
        tracing::info!("quitting with a run still in flight");
    }
    Ok(())
}

/// Poll crossterm on a blocking thread. Exits once the loop drops its receiver.
fn spawn_input_reader(input_tx: mpsc::UnboundedSender<TuiEvent>) {
    tokio::task::spawn_blocking(move || {
        while !input_tx.is_closed() {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let ev = match event::read() {
                Ok(Event::Key(key)) => TuiEvent::Key(key),
                Ok(Event::Paste(text)) => TuiEvent::Paste(text),
                Ok(Event::Resize(_, _)) => TuiEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read terminal event");
                    continue;
                }
            };
            if input_tx.send(ev).is_err() {
                break; // Channel closed
            }
        }
    });
}
