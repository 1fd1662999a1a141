//! Reset CLI command.
//!
//! Clears the persisted position once an operator has confirmed the broker
//! side by hand, typically after an unconfirmed close.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use tracing::warn;

use sentinel_options_manager::{ManagerConfig, StateStore};

use super::DEFAULT_CONFIG;

/// Arguments for the reset command.
#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Confirm the broker position is already flat
    #[arg(long)]
    pub yes: bool,
}

/// Runs the reset command.
///
/// # Errors
/// Returns an error without `--yes`, or if the state file cannot be written.
pub fn run_reset(args: ResetArgs) -> Result<()> {
    let config = ManagerConfig::load(&args.config)?;
    let store = StateStore::new(config.state.path.clone());

    if !args.yes {
        bail!(
            "refusing to clear {} without --yes; confirm the broker position is flat first",
            store.path().display()
        );
    }

    if let Some(position) = store.load() {
        warn!(
            contract = %position.contract_identity.display_name(),
            quantity = position.quantity,
            "Clearing open position record by operator request"
        );
    }
    store.clear()?;
    println!("State cleared: {}", store.path().display());
    Ok(())
}
