//! `create-discord-guild` entry point.
//!
//! Parses the command line, then hands off to [`create_discord_guild::run`].
//! Logs go to stderr; the two progress lines and the final failure line are
//! the only user-facing output.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use create_discord_guild::config::CliArgs;
use create_discord_guild::notify::ConsoleNotifier;

const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Initialise tracing (respects RUST_LOG env, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match CliArgs::parse().into_config() {
        Ok(config) => config,
        Err(e) => return fail(&e.report()),
    };

    match create_discord_guild::run(&config, &ConsoleNotifier).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            fail(&e.report())
        }
    }
}

fn fail(report: &str) -> ExitCode {
    eprintln!("{}✕ {}{}", RED, report, RESET);
    ExitCode::FAILURE
}
