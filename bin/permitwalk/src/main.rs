mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "permitwalk")]
#[command(about = "Extract permit records from the county permit wizard", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk every permit in the input file and write JSONL records
    Run {
        /// Identifier file (overrides config crawl.inputFile)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Records file (overrides config crawl.outputFile)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Failures file (overrides config crawl.failuresFile)
        #[arg(long)]
        failures: Option<PathBuf>,

        /// Walks in flight at once (overrides config crawl.concurrency)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Stop after this many identifiers
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Walk a single permit and print its record
    Fetch {
        /// Permit number
        permit: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            failures,
            concurrency,
            limit,
        } => {
            let overrides = commands::run::RunOverrides {
                input,
                output,
                failures,
                concurrency,
                limit,
            };
            commands::run::run(overrides).await?;
        }
        Commands::Fetch { permit } => {
            commands::fetch::run(&permit).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
        },
    }

    Ok(())
}
