use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use exrate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for exrate::AppCommand {
    fn from(cmd: Commands) -> exrate::AppCommand {
        match cmd {
            Commands::Transform {
                source,
                target,
                amount,
            } => exrate::AppCommand::Transform {
                source,
                target,
                amount,
            },
            Commands::Rate { source, targets } => exrate::AppCommand::Rate { source, targets },
            Commands::Rates { source } => exrate::AppCommand::Rates { source },
            Commands::Cached => exrate::AppCommand::Cached,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount from one currency to another
    Transform {
        source: String,
        target: String,
        #[arg(allow_negative_numbers = true)]
        amount: f64,
    },
    /// Show the rate from a currency to one or more others
    Rate {
        source: String,
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Show every rate for a base currency
    Rates { source: String },
    /// List cached base currencies and their freshness
    Cached,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => exrate::cli::setup::setup(),
        Some(cmd) => exrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
