//! Non-interactive `--run`: submit one source text through the normal
//! lifecycle and report how the process should exit.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use crate::execution::{
    ExecutionSession, ExecutionTransport, LifecycleEvent, ProgressSettings, SourceText,
    SubmitOutcome,
};
use crate::output::TerminalPrinter;

/// How the process should end after a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    RunFailed,
}

/// Source for `--run`: the file, or `stdin` when the path is `-` or absent.
pub fn read_source(
    file: Option<&Path>,
    mut stdin: impl Read,
    stdin_is_tty: bool,
) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            if stdin_is_tty {
                bail!("--run needs a FILE argument or piped input");
            }
            let mut buf = String::new();
            stdin
                .read_to_string(&mut buf)
                .context("failed to read source from stdin")?;
            Ok(buf)
        }
    }
}

/// Run `source` to completion. The printer is handed back so callers can
/// inspect what was written.
pub async fn run_once<T, O, E>(
    transport: T,
    printer: TerminalPrinter<O, E>,
    settings: ProgressSettings,
    source: SourceText,
) -> Result<(Exit, TerminalPrinter<O, E>)>
where
    T: ExecutionTransport,
    O: Write,
    E: Write,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<LifecycleEvent>();
    let mut session = ExecutionSession::new(transport, printer, settings, tx);

    if let SubmitOutcome::AlreadyRunning = session.submit(source) {
        bail!("a run is already in progress");
    }

    session
        .run_until_idle(&mut rx, |s| {
            if s.is_running() {
                let value = s.progress().value();
                s.sink_mut().show_progress(value);
            }
        })
        .await;

    let printer = session.into_sink();
    let exit = match printer.failed() {
        Some(false) => Exit::Success,
        Some(true) => Exit::RunFailed,
        None => bail!("execution finished without a result"),
    };
    Ok((exit, printer))
}
