pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "citequotes",
    about = "CiteQuotes operator CLI",
    long_about = "Operate the CiteQuotes archive: migrations, fixtures, config inspection, bulk import/export and access bootstrap.",
    after_help = "Examples:\n  citequotes doctor --json\n  citequotes import quotes.csv --dry-run\n  citequotes grant-role --email root@example.org --role super_admin"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ImportFormatArg {
    Csv,
    Markdown,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic seed dataset and verify it")]
    Seed,
    #[command(about = "Show effective configuration with source attribution and redaction")]
    Config,
    #[command(about = "Validate config, language model settings and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Queue quotes from a CSV or Markdown file as pending submissions")]
    Import {
        file: PathBuf,
        #[arg(long, value_enum, help = "Input format; inferred from the file extension when omitted")]
        format: Option<ImportFormatArg>,
        #[arg(long, help = "Parse and report without writing anything")]
        dry_run: bool,
    },
    #[command(about = "Export published quotes as CSV")]
    Export {
        #[arg(long, short, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Create the user if missing and print a new bearer token once")]
    IssueToken {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, help = "Token lifetime in hours; defaults to auth.token_ttl_hours")]
        ttl_hours: Option<u64>,
    },
    #[command(about = "Assign a role directly, bypassing the API's privilege checks")]
    GrantRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Import { file, format, dry_run } => {
            commands::import::run(&file, format, dry_run)
        }
        Command::Export { output } => commands::export::run(output.as_deref()),
        Command::IssueToken { email, name, ttl_hours } => {
            commands::issue_token::run(&email, name.as_deref(), ttl_hours)
        }
        Command::GrantRole { email, role } => commands::grant_role::run(&email, &role),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
