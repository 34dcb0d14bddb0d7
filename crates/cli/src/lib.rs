pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "clubbot",
    about = "Club bot operator CLI",
    long_about = "Apply migrations, inspect configuration, and fire the scheduled name check by hand.",
    after_help = "Examples:\n  clubbot migrate\n  clubbot config\n  clubbot name-check --dry-run"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Run the scheduled display-name check once")]
    NameCheck {
        #[arg(long, help = "Report who would be warned without sending any DM")]
        dry_run: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::NameCheck { dry_run } => commands::name_check::run(dry_run),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

// stdout carries the JSON outcome line, so logs go to stderr.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
