pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "customers",
    about = "Customer service operator CLI",
    long_about = "Inspect configuration, check runtime readiness, and look up token privileges.",
    after_help = "Examples:\n  customers doctor --json\n  customers config\n  customers privileges admin-token"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, the privilege source, and customer storage")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve the privileges granted to an auth token")]
    Privileges {
        #[arg(help = "Auth token to look up")]
        token: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Privileges { token } => commands::privileges::run(&token),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
