//! Check-config CLI command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use sentinel_core::UsEquityHours;
use sentinel_options_manager::ManagerConfig;

use super::params::render_table;
use super::DEFAULT_CONFIG;

/// Arguments for the check-config command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

fn market_session(now: DateTime<Utc>) -> &'static str {
    if UsEquityHours::regular().is_open_at(now) {
        "open"
    } else {
        "closed"
    }
}

/// Loads and validates the config, then prints a summary.
///
/// # Errors
/// Returns an error if the file is missing, malformed, or fails validation.
pub fn run_check_config(args: CheckConfigArgs) -> Result<()> {
    let config = ManagerConfig::load(&args.config)
        .with_context(|| format!("invalid config {}", args.config.display()))?;

    println!("Config OK: {}", args.config.display());
    println!();
    println!("  state file        {}", config.state.path.display());
    println!("  symbol            {}", config.universe.symbol);
    println!("  poll interval     {}s", config.monitor.poll_interval_secs);
    println!("  breakeven buffer  {}%", config.monitor.breakeven_buffer_pct);
    println!("  fill timeout      {}s", config.closer.fill_timeout_secs);
    println!("  cycle interval    {}s", config.supervisor.cycle_interval_secs);
    println!("  min volume        {}", config.entry.min_volume);
    println!("  reversion above   VIX {}", config.entry.reversion_vix_threshold);
    println!("  market now        {}", market_session(Utc::now()));
    println!();
    print!("{}", render_table(&config.regimes, None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reports_regular_session() {
        // 11:00 and 21:00 New York time on a Monday, then a Saturday.
        assert_eq!(market_session(Utc.with_ymd_and_hms(2026, 6, 15, 15, 0, 0).unwrap()), "open");
        assert_eq!(market_session(Utc.with_ymd_and_hms(2026, 6, 16, 1, 0, 0).unwrap()), "closed");
        assert_eq!(market_session(Utc.with_ymd_and_hms(2026, 6, 20, 15, 0, 0).unwrap()), "closed");
    }
}
