mod cli;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match cli::run(args).await? {
        cli::Exit::Success => Ok(()),
        // The failure message has already been printed by the sink.
        cli::Exit::RunFailed => std::process::exit(1),
    }
}
