mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::amortization::AmortizeArgs;
use commands::formulas::{CompoundingArgs, EvaluateArgs, FormulasArgs, TimelineArgs};

/// Time-value-of-money calculations with decimal precision
#[derive(Parser)]
#[command(
    name = "tvm",
    version,
    about = "Time-value-of-money calculations with decimal precision",
    long_about = "A CLI for solving time-value-of-money formulas for any unknown \
                  (PV, FV, PMT, rate, periods, compounding frequency) and for \
                  generating loan amortization schedules with rate changes, extra \
                  payments and offset accounts."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log solver and schedule diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a formula family for one unknown
    Evaluate(EvaluateArgs),
    /// List formula families, or show one family's variations and defaults
    Formulas(FormulasArgs),
    /// Year-by-year growth for a formula family
    Timeline(TimelineArgs),
    /// Compare future value across compounding frequencies
    Compounding(CompoundingArgs),
    /// Generate a loan amortization schedule
    Amortize(AmortizeArgs),
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

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tvm_core=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tvm_core=warn"))
    };

    // stdout carries the result, so diagnostics go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::formulas::run_evaluate(args),
        Commands::Formulas(args) => commands::formulas::run_formulas(args),
        Commands::Timeline(args) => commands::formulas::run_timeline(args),
        Commands::Compounding(args) => commands::formulas::run_compounding(args),
        Commands::Amortize(args) => commands::amortization::run_amortize(args),
        Commands::Version => {
            println!("tvm {}", env!("CARGO_PKG_VERSION"));
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
