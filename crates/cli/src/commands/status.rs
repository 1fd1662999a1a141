//! Status CLI command.
//!
//! Reads the persisted position without touching the broker and shows where
//! its stops currently sit.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use sentinel_options_manager::stops::{breakeven_floor, final_stop_price, trailing_stop_price};
use sentinel_options_manager::{ManagerConfig, Position, StateError, StateStore};

use super::DEFAULT_CONFIG;

/// Arguments for the status command.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Print the raw record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Human-readable report for an open position.
pub fn describe(position: &Position, config: &ManagerConfig) -> String {
    let buffer = config.monitor.breakeven_buffer_pct;
    let targets = config.regimes.targets_for(position.regime);
    let trailing = trailing_stop_price(position.highest_price, position.trailing_percent);
    let floor = breakeven_floor(position.entry_price, buffer);
    let stop = final_stop_price(position, buffer);

    let level = |value: Option<Decimal>| {
        value.map_or_else(|| "out of range".to_string(), |v| v.round_dp(4).to_string())
    };

    let mut out = String::new();
    out.push_str(&format!("Contract     {}\n", position.contract_identity.display_name()));
    out.push_str(&format!("Regime       {}\n", position.regime));
    out.push_str(&format!("Phase        {:?}\n", position.phase()));
    out.push_str(&format!("Quantity     {}\n", position.quantity));
    out.push_str(&format!("Entry        {}\n", position.entry_price));
    out.push_str(&format!("High         {}\n", position.highest_price));
    out.push_str(&format!("Trailing     {}%\n", position.trailing_percent));
    out.push_str(&format!(
        "Targets      {}% / {}% (tighten to {}%)\n",
        targets.target_1_gain_pct, targets.target_2_gain_pct, targets.tightened_stop_pct
    ));
    out.push_str(&format!("Trail stop   {}\n", level(trailing)));
    if position.breakeven_activated {
        out.push_str(&format!("Floor        {}\n", level(floor)));
    }
    out.push_str(&format!("Active stop  {}\n", level(stop)));
    out
}

/// Runs the status command.
///
/// # Errors
/// Returns an error if the config cannot be loaded. A corrupt state file is
/// reported, not treated as an error.
pub fn run_status(args: StatusArgs) -> Result<()> {
    let config = ManagerConfig::load(&args.config)?;
    let store = StateStore::new(config.state.path.clone());

    match store.load_checked() {
        Ok(None) => println!("No open position ({})", store.path().display()),
        Ok(Some(position)) if args.json => println!("{}", serde_json::to_string_pretty(&position)?),
        Ok(Some(position)) => print!("{}", describe(&position, &config)),
        Err(StateError::Invariant(reason)) => {
            println!("State file {} is inconsistent: {reason}", store.path().display());
        }
        Err(e) => println!("State file {} is unreadable: {e}", store.path().display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sentinel_broker::{ContractIdentity, OptionRight};
    use sentinel_options_manager::Regime;

    #[test]
    fn describes_armed_position() {
        let contract = ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        );
        let mut pos = Position::opened(contract, dec!(2.00), 2, dec!(10), Regime::Trend);
        pos.highest_price = dec!(2.40);
        pos.breakeven_activated = true;

        let out = describe(&pos, &ManagerConfig::default());

        assert!(out.contains("SPY 500C 2026-06-19"));
        assert!(out.contains("BreakevenActive"));
        assert!(out.contains("Floor        2.01"));
        assert!(out.contains("Active stop  2.16"));
    }
}
