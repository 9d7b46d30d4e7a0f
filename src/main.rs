use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xrates::cli::setup::setup;
use xrates::core::log::init_logging;

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

impl From<Commands> for xrates::AppCommand {
    fn from(cmd: Commands) -> xrates::AppCommand {
        match cmd {
            Commands::Currencies => xrates::AppCommand::Currencies,
            Commands::Select { code } => xrates::AppCommand::Select(code),
            Commands::Convert { amount, to } => xrates::AppCommand::Convert { amount, to },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List the currencies the provider supports
    Currencies,
    /// Choose the base currency for conversions
    Select {
        /// Three letter currency code, e.g. EUR
        code: String,
    },
    /// Convert an amount into every supported currency
    Convert {
        /// Amount to convert; the last amount is reused when omitted
        amount: Option<String>,

        /// Base currency of the amount
        #[arg(short, long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => xrates::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
