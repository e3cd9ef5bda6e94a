use anyhow::Result;
use clap::Parser;

mod cli;
mod scenarios;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.run().await {
        Ok(cli::RunStatus::Passed) => Ok(()),
        Ok(cli::RunStatus::Failed) => std::process::exit(1),
        Err(err) => {
            // Nothing ran: configuration or host setup is broken
            eprintln!("Error: {:#}", err);
            std::process::exit(2);
        }
    }
}
