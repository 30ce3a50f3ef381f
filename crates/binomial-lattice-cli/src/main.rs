mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::lattice::LatticeArgs;
use commands::sweep::SweepArgs;

/// Multi-period binomial lattice option pricing
#[derive(Parser)]
#[command(
    name = "lattice",
    version,
    about = "Multi-period binomial lattice option pricing",
    long_about = "Prices European options on a recombining Cox-Ross-Rubinstein lattice \
                  with decimal precision and reports the replicating portfolio \
                  (stock delta and money-market eta) at every node."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Price an option and report the root hedge and full lattice
    Price(LatticeArgs),
    /// List every lattice node with its price, value and hedge
    Nodes(LatticeArgs),
    /// Re-price while stepping one model parameter
    Sweep(SweepArgs),
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

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Price(args) => commands::lattice::run_price(args),
        Commands::Nodes(args) => commands::lattice::run_nodes(args),
        Commands::Sweep(args) => commands::sweep::run_sweep(args),
        Commands::Version => {
            println!("lattice {}", env!("CARGO_PKG_VERSION"));
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
