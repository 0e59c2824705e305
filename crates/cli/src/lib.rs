pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use leadflow_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Operate the Leadflow lead scoring engine: preflight, migrations, demo data, config inspection, and one-off scoring.",
    after_help = "Examples:\n  leadflow migrate\n  leadflow score --input lead.json\n  cat lead.json | leadflow score --input -"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to leadflow.toml (defaults to ./leadflow.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo staff and promotions")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Score a quote submission and store the resulting lead")]
    Score {
        #[arg(long, help = "JSON submission file, or `-` to read stdin")]
        input: String,
        #[arg(long, help = "Print the scored lead without saving it")]
        dry_run: bool,
    },
    #[command(about = "Re-run scoring for a stored lead")]
    Rescore {
        #[arg(long, help = "Quote request id")]
        id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    if let Ok(config) = AppConfig::load(options.clone()) {
        logging::init(&config.logging);
    }

    let result = match cli.command {
        Command::Start => commands::start::run(options),
        Command::Migrate => commands::migrate::run(options),
        Command::Seed => commands::seed::run(options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Score { input, dry_run } => commands::score::run(options, &input, dry_run),
        Command::Rescore { id } => commands::rescore::run(options, &id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
