use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use is_terminal::IsTerminal;

use natpy::batch;
pub use natpy::batch::Exit;
use natpy::config::Config;
use natpy::editor::STARTER_PROGRAM;
use natpy::execution::{HttpTransport, SourceText};
use natpy::output::TerminalPrinter;
use natpy::tui::{self, Theme};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "natpy",
    about = "Write Natural Python in the terminal and run it remotely",
    version
)]
#[command(group(ArgGroup::new("mode").args(["run", "check"]).multiple(false)))]
pub struct Cli {
    /// File to open in the editor, or to submit with --run ("-" reads stdin).
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Submit the file once, print the result and exit.
    ///
    /// Output goes to stdout verbatim; a failure message goes to stderr and the
    /// exit code is 1.
    #[arg(long)]
    pub run: bool,

    /// Check that the execution service is reachable.
    #[arg(long)]
    pub check: bool,

    /// Base URL of the execution service (overrides API_BASE_URL).
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Initial colour theme (overrides DEFAULT_THEME).
    #[arg(long, value_enum)]
    pub theme: Option<Theme>,

    /// Disable coloured output in --run mode.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

pub async fn run(args: Cli) -> Result<Exit> {
    let mut cfg = Config::load();
    if let Some(url) = args.api_url.as_deref() {
        cfg.set("API_BASE_URL", url);
    }

    let log_path = cfg.log_file();
    if let Err(e) = natpy::logging::init(&log_path) {
        eprintln!("warning: logging disabled: {e:#}");
    }
    for warning in cfg.warnings() {
        eprintln!("warning: {warning}");
        tracing::warn!("{warning}");
    }

    if args.check {
        return run_check(&cfg).await;
    }
    if args.run {
        return run_once(&cfg, &args).await;
    }

    let theme = args.theme.unwrap_or_else(|| {
        let name = cfg.default_theme();
        Theme::parse(&name).unwrap_or_else(|| {
            tracing::warn!(theme = %name, "unknown DEFAULT_THEME, using dark");
            Theme::Dark
        })
    });

    let (text, file_name) = match args.file.as_deref() {
        Some(path) => (read_source_file(path)?, Some(path.display().to_string())),
        None => (STARTER_PROGRAM.to_string(), None),
    };

    tui::run_tui(&cfg, &text, file_name, theme).await?;
    Ok(Exit::Success)
}

async fn run_check(cfg: &Config) -> Result<Exit> {
    let transport = HttpTransport::from_config(cfg)?;
    let status = transport.health().await?;
    println!("{}: {}", cfg.health_url(), status);
    Ok(Exit::Success)
}

/// Submit once through the same lifecycle the editor uses.
async fn run_once(cfg: &Config, args: &Cli) -> Result<Exit> {
    let stdin = io::stdin();
    let stdin_is_tty = stdin.is_terminal();
    let source = batch::read_source(args.file.as_deref(), stdin.lock(), stdin_is_tty)?;

    let stderr_is_tty = io::stderr().is_terminal();
    let printer = TerminalPrinter::new(!args.no_color && stderr_is_tty)
        .with_progress_line(stderr_is_tty);

    let transport = HttpTransport::from_config(cfg)?;
    let (exit, _) = batch::run_once(
        transport,
        printer,
        cfg.progress_settings(),
        SourceText::new(source),
    )
    .await?;
    Ok(exit)
}

fn read_source_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
