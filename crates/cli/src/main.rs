use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckConfigArgs, ParamsArgs, ReplayArgs, ResetArgs, StatusArgs};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Single-position options risk manager", long_about = None)]
struct Cli {
    /// Optional log file path (appends instead of logging to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the regime risk-parameter table
    Params(ParamsArgs),
    /// Load and validate a config file
    CheckConfig(CheckConfigArgs),
    /// Show the persisted position and its current stop levels
    Status(StatusArgs),
    /// Clear persisted state after manual intervention
    Reset(ResetArgs),
    /// Paper-trade a position against a recorded tick file
    Replay(ReplayArgs),
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Params(args) => commands::run_params(args)?,
        Commands::CheckConfig(args) => commands::run_check_config(args)?,
        Commands::Status(args) => commands::run_status(args)?,
        Commands::Reset(args) => commands::run_reset(args)?,
        Commands::Replay(args) => commands::run_replay(args).await?,
    }

    Ok(())
}
