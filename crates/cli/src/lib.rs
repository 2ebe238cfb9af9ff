pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "medicert",
    about = "Medicert operator CLI",
    long_about = "Operate the Medicert registry: apply migrations, verify certificate codes, and inspect effective configuration.",
    after_help = "Examples:\n  medicert migrate\n  medicert verify MEDC123456\n  medicert config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Look up a certificate by code against the configured database")]
    Verify {
        #[arg(help = "Certificate code, e.g. MEDC123456 (case-insensitive)")]
        code: String,
    },
    #[command(about = "Validate and print effective configuration with secrets redacted")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Verify { code } => commands::verify::run(&code),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
