pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shopkeep",
    about = "Shopkeep operator CLI",
    long_about = "Operate the Shopkeep catalog assistant: migrations, sample data, readiness checks, config inspection, and one-off chat turns.",
    after_help = "Examples:\n  shopkeep doctor --json\n  shopkeep seed\n  shopkeep ask \"How much is the iPhone 15?\" --in-memory"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Insert the sample catalog when the catalog is empty")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LINE credentials, LLM wiring, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one chat turn through the assistant and print the reply")]
    Ask {
        #[arg(help = "The customer message to answer")]
        utterance: String,
        #[arg(long, help = "Answer from the sample catalog held in memory instead of the database")]
        in_memory: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { utterance, in_memory } => commands::ask::run(&utterance, in_memory),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
