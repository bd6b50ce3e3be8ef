#![allow(clippy::print_stdout, clippy::print_stderr)] // CLI binary: stdout/stderr is the UI

mod cli;
mod config;
mod config_check;
mod console;
mod download;
mod host;
mod publish;
mod restart;
mod tracing_setup;
mod ui_loop;
mod views;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::Config;
use crate::host::Exit;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The full-screen UI owns the terminal; everything else may log to stderr.
    let console_log = !matches!(cli.command, Commands::Run { .. });
    let _tracing_guard = tracing_setup::init(console_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "cellar starting"
    );

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run { no_irc } => {
            let exit = ui_loop::run(&Config::load_or_default(config)?, no_irc).await?;
            finish(exit)
        }
        Commands::Serve => {
            let exit = console::serve(&Config::load_or_default(config)?).await?;
            finish(exit)
        }
        Commands::Call { verb, args } => cmd_call(config, &verb, &args).await,
        Commands::Check { format } => cmd_check(config, format),
        Commands::Version => {
            println!("cellar {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn finish(exit: Exit) -> Result<()> {
    match exit {
        Exit::Quit => Ok(()),
        Exit::Restart => restart::relaunch(),
    }
}

async fn cmd_call(config_path: Option<&str>, verb: &str, args: &[String]) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let endpoint = publish::read_endpoint(&config.paths.home_dir())?;
    let response = cellar_wizard::call(endpoint.port, &endpoint.cookie, verb, args).await?;
    println!("{response}");
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // must return Result to match main's match arms
fn cmd_check(config_path: Option<&str>, format: OutputFormat) -> Result<()> {
    let config_file = Config::find_config_path(config_path);
    let report = config_check::validate_config(&config_file, config_path.is_some());

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&report.to_json_value()) {
            Ok(json) => println!("{json}"),
            Err(error) => eprintln!("failed to encode report: {error}"),
        },
        OutputFormat::Human => println!("{}", report.to_summary_string()),
    }

    if report.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
