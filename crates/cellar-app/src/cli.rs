use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cellar", version, about = "Cellar: a Wine prefix controller")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Full-screen UI: support chat plus the Setup Wizard server.
    Run {
        /// Do not connect to the support chat.
        #[arg(long)]
        no_irc: bool,
    },
    /// Headless Setup Wizard server; prompts are answered on stdin.
    Serve,
    /// Send one request to a running server and print the response.
    Call {
        verb: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    Check {
        /// Output format: human (default) or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Human,
    Json,
}
