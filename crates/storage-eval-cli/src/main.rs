mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::evaluate::{EvaluateArgs, MetricsArgs, TableArgs};
use commands::sensitivity::SensitivityArgs;
use commands::statement::StatementArgs;

/// Full-life financial evaluation of battery energy storage projects
#[derive(Parser)]
#[command(
    name = "storage-eval",
    version,
    about = "Full-life financial evaluation of battery energy storage projects",
    long_about = "Builds the 21-year cash-flow table of a grid-connected battery storage \
                  project (VAT credit carryforward, surtax, dual depreciation, tax holiday, \
                  battery replacement) and derives pre/post-tax IRR and payback period \
                  with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a project: cash-flow table, metrics and assumptions
    Evaluate(EvaluateArgs),
    /// Headline metrics only (IRR, payback, total investment)
    Metrics(MetricsArgs),
    /// Year-by-year cash-flow table
    Table(TableArgs),
    /// Financial statement derived from the cash-flow table
    Statement(StatementArgs),
    /// Single-factor sensitivity of the pre-tax IRR
    Sensitivity(SensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::evaluate::run_evaluate(args),
        Commands::Metrics(args) => commands::evaluate::run_metrics(args),
        Commands::Table(args) => commands::evaluate::run_table(args),
        Commands::Statement(args) => commands::statement::run_statement(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Version => {
            println!("storage-eval {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
