//! Risk parameter selection: regime to allocation, stop and target constants.
//!
//! Everything here is a pure lookup over the static regime table, so a
//! recovered position can rebuild its thresholds from `regime` alone.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::types::{ProfitTargets, Regime};

/// Allocation and risk constants for one regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskParameters {
    /// Fraction of account equity committed to a new position (0.0375 = 3.75%).
    pub allocation_fraction: Decimal,
    /// Trailing stop distance at entry (%).
    pub initial_trailing_pct: Decimal,
    /// Gain (%) that moves the stop floor to breakeven.
    pub target_1_gain_pct: Decimal,
    /// Gain (%) that tightens the trailing stop.
    pub target_2_gain_pct: Decimal,
    /// Trailing stop distance after target 2 (%).
    pub tightened_stop_pct: Decimal,
}

impl RiskParameters {
    #[must_use]
    pub fn targets(&self) -> ProfitTargets {
        ProfitTargets {
            target_1_gain_pct: self.target_1_gain_pct,
            target_2_gain_pct: self.target_2_gain_pct,
            tightened_stop_pct: self.tightened_stop_pct,
        }
    }

    fn validate(&self, regime: Regime) -> Result<(), ConfigError> {
        let field = |name: &str| format!("regimes.{}.{name}", regime.as_str().to_lowercase());
        let hundred = Decimal::from(100);

        if self.allocation_fraction <= Decimal::ZERO || self.allocation_fraction > Decimal::ONE {
            return Err(ConfigError::invalid(field("allocation_fraction"), "must be in (0, 1]"));
        }
        for (name, pct) in [
            ("initial_trailing_pct", self.initial_trailing_pct),
            ("tightened_stop_pct", self.tightened_stop_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= hundred {
                return Err(ConfigError::invalid(field(name), "must be in (0, 100)"));
            }
        }
        if self.target_1_gain_pct <= Decimal::ZERO {
            return Err(ConfigError::invalid(field("target_1_gain_pct"), "must be positive"));
        }
        if self.target_2_gain_pct < self.target_1_gain_pct {
            return Err(ConfigError::invalid(
                field("target_2_gain_pct"),
                "must be at least target_1_gain_pct",
            ));
        }
        if self.tightened_stop_pct >= self.initial_trailing_pct {
            return Err(ConfigError::invalid(
                field("tightened_stop_pct"),
                "must be tighter than initial_trailing_pct",
            ));
        }
        Ok(())
    }
}

/// Risk parameters keyed by regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegimeTable {
    pub trend: RiskParameters,
    pub reversion: RiskParameters,
}

impl Default for RegimeTable {
    fn default() -> Self {
        Self {
            trend: RiskParameters {
                allocation_fraction: dec!(0.0375),
                initial_trailing_pct: dec!(10),
                target_1_gain_pct: dec!(25),
                target_2_gain_pct: dec!(50),
                tightened_stop_pct: dec!(8),
            },
            reversion: RiskParameters {
                allocation_fraction: dec!(0.0105),
                initial_trailing_pct: dec!(20),
                target_1_gain_pct: dec!(15),
                target_2_gain_pct: dec!(30),
                tightened_stop_pct: dec!(5),
            },
        }
    }
}

impl RegimeTable {
    /// Parameters for a regime.
    #[must_use]
    pub fn select(&self, regime: Regime) -> &RiskParameters {
        match regime {
            Regime::Trend => &self.trend,
            Regime::Reversion => &self.reversion,
        }
    }

    /// Profit-target thresholds for a regime.
    #[must_use]
    pub fn targets_for(&self, regime: Regime) -> ProfitTargets {
        self.select(regime).targets()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trend.validate(Regime::Trend)?;
        self.reversion.validate(Regime::Reversion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_by_regime() {
        let table = RegimeTable::default();
        assert_eq!(table.select(Regime::Trend).initial_trailing_pct, dec!(10));
        assert_eq!(table.select(Regime::Reversion).initial_trailing_pct, dec!(20));
    }

    #[test]
    fn targets_rebuild_from_regime_alone() {
        let table = RegimeTable::default();
        let targets = table.targets_for(Regime::Reversion);
        assert_eq!(targets.target_1_gain_pct, dec!(15));
        assert_eq!(targets.target_2_gain_pct, dec!(30));
        assert_eq!(targets.tightened_stop_pct, dec!(5));
        assert_eq!(targets, table.targets_for(Regime::Reversion));
    }

    #[test]
    fn default_table_is_valid() {
        assert!(RegimeTable::default().validate().is_ok());
    }

    #[test]
    fn rejects_loosening_profit_lock() {
        let mut table = RegimeTable::default();
        table.trend.tightened_stop_pct = dec!(12);
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("regimes.trend.tightened_stop_pct"));
    }

    #[test]
    fn rejects_out_of_range_allocation() {
        let mut table = RegimeTable::default();
        table.reversion.allocation_fraction = dec!(1.5);
        assert!(table.validate().is_err());
        table.reversion.allocation_fraction = Decimal::ZERO;
        assert!(table.validate().is_err());
    }

    #[test]
    fn rejects_inverted_targets() {
        let mut table = RegimeTable::default();
        table.trend.target_2_gain_pct = dec!(10);
        assert!(table.validate().is_err());
    }
}
