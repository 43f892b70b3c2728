use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sluice_core::StatementKind;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sluice", version, about = "Sluice driver proxy tools")]
struct Cli {
    /// Path to the sluice configuration file
    #[arg(long, short, global = true, env = "SLUICE_CONFIG", default_value = "sluice.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and report contradictory settings.
    Check,

    /// Show the SQL the delegate driver would receive for a statement.
    Rewrite {
        /// SQL text as the client would pass it
        sql: String,

        /// Statement kind: plain, prepared or callable
        #[arg(long, default_value = "plain")]
        kind: StatementKind,

        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show whether the proxy claims an address and what it forwards.
    Resolve {
        /// Connection address, e.g. sluice:pg://localhost/app
        address: String,

        /// Connect option as key=value (repeatable)
        #[arg(long = "option", short = 'o', value_parser = commands::resolve::parse_option)]
        options: Vec<(String, String)>,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(config = %cli.config.display(), "Using configuration");

    match cli.cmd {
        Command::Check => commands::check::run(&cli.config),
        Command::Rewrite { sql, kind, json } => {
            commands::rewrite::run(&cli.config, &sql, kind, json)
        }
        Command::Resolve { address, options } => {
            commands::resolve::run(&cli.config, &address, options)
        }
    }
}
