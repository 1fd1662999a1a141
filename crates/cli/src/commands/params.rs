//! Params CLI command.
//!
//! Prints the allocation, stop and target constants for each regime.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sentinel_options_manager::{ManagerConfig, Regime, RegimeTable, RiskParameters};

/// Arguments for the params command.
#[derive(Args, Debug, Clone)]
pub struct ParamsArgs {
    /// Only show one regime (trend or reversion)
    #[arg(long)]
    pub regime: Option<Regime>,

    /// Config file to read the table from. Built-in defaults when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn format_row(regime: Regime, p: &RiskParameters) -> String {
    format!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        regime.as_str(),
        format!("{}%", (p.allocation_fraction * rust_decimal::Decimal::from(100)).normalize()),
        format!("{}%", p.initial_trailing_pct.normalize()),
        format!("{}%", p.target_1_gain_pct.normalize()),
        format!("{}%", p.target_2_gain_pct.normalize()),
        format!("{}%", p.tightened_stop_pct.normalize()),
    )
}

/// Renders the table for the requested regimes.
pub fn render_table(table: &RegimeTable, only: Option<Regime>) -> String {
    let mut out = format!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "REGIME", "ALLOC", "TRAIL", "TARGET 1", "TARGET 2", "TIGHTENED"
    );
    for regime in [Regime::Trend, Regime::Reversion] {
        if only.is_some_and(|r| r != regime) {
            continue;
        }
        out.push_str(&format_row(regime, table.select(regime)));
        out.push('\n');
    }
    out
}

/// Runs the params command.
///
/// # Errors
/// Returns an error if the config file cannot be loaded.
pub fn run_params(args: ParamsArgs) -> Result<()> {
    let table = match &args.config {
        Some(path) => ManagerConfig::load(path)?.regimes,
        None => RegimeTable::default(),
    };
    print!("{}", render_table(&table, args.regime));
    Ok(())
}
