//! Types for single-position options risk management.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sentinel_broker::ContractIdentity;

/// Market regime fixed at entry. Selects which risk-parameter set applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    /// Normal or low volatility: trend following.
    #[default]
    Trend,
    /// High volatility: mean reversion.
    Reversion,
}

impl Regime {
    /// Volatility index strictly above `threshold` is mean-reversion territory.
    /// A missing reading falls back to trend.
    #[must_use]
    pub fn classify(volatility_index: Option<Decimal>, threshold: Decimal) -> Self {
        match volatility_index {
            Some(vix) if vix > threshold => Self::Reversion,
            _ => Self::Trend,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trend => "TREND",
            Self::Reversion => "REVERSION",
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TREND" => Ok(Self::Trend),
            "REVERSION" => Ok(Self::Reversion),
            other => Err(format!("unknown regime: {other}")),
        }
    }
}

/// Profit-target thresholds for a regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitTargets {
    /// Gain (%) that arms the breakeven floor.
    pub target_1_gain_pct: Decimal,
    /// Gain (%) that arms the profit lock.
    pub target_2_gain_pct: Decimal,
    /// Trailing distance (%) once the profit lock is armed.
    pub tightened_stop_pct: Decimal,
}

/// The single managed position.
///
/// Invariants: `highest_price >= entry_price`, `trailing_percent` never
/// increases, and `profit_lock_activated` implies `breakeven_activated`.
///
/// Records written before the regime and profit flags existed load as an
/// unarmed trend position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub contract_identity: ContractIdentity,
    pub entry_price: Decimal,
    pub quantity: u32,
    pub highest_price: Decimal,
    pub trailing_percent: Decimal,
    #[serde(default)]
    pub regime: Regime,
    #[serde(default)]
    pub breakeven_activated: bool,
    #[serde(default)]
    pub profit_lock_activated: bool,
}

impl Position {
    /// Freshly filled position with no profit flags armed.
    #[must_use]
    pub fn opened(
        contract_identity: ContractIdentity,
        entry_price: Decimal,
        quantity: u32,
        trailing_percent: Decimal,
        regime: Regime,
    ) -> Self {
        Self {
            contract_identity,
            entry_price,
            quantity,
            highest_price: entry_price,
            trailing_percent,
            regime,
            breakeven_activated: false,
            profit_lock_activated: false,
        }
    }

    /// Gain of `price` over entry, in percent. `None` when the entry is zero
    /// or the ratio does not fit in a `Decimal`.
    #[must_use]
    pub fn gain_pct(&self, price: Decimal) -> Option<Decimal> {
        price
            .checked_sub(self.entry_price)?
            .checked_div(self.entry_price)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }

    /// Monitoring phase implied by the armed flags.
    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        if self.profit_lock_activated {
            MonitorPhase::ProfitLockActive
        } else if self.breakeven_activated {
            MonitorPhase::BreakevenActive
        } else {
            MonitorPhase::Initial
        }
    }

    /// Checks the invariants that must hold in every persisted snapshot.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.profit_lock_activated && !self.breakeven_activated {
            return Err("profit lock armed without breakeven".to_string());
        }
        if self.highest_price < self.entry_price {
            return Err(format!(
                "highest price {} below entry {}",
                self.highest_price, self.entry_price
            ));
        }
        if self.quantity == 0 {
            return Err("quantity must be positive".to_string());
        }
        if self.trailing_percent <= Decimal::ZERO {
            return Err("trailing percent must be positive".to_string());
        }
        Ok(())
    }
}

/// Position monitor state machine.
///
/// `Initial -> BreakevenActive -> ProfitLockActive -> Closing -> Closed`,
/// with `Aborted` reachable on fatal errors. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MonitorPhase {
    Initial,
    BreakevenActive,
    ProfitLockActive,
    Closing,
    Closed,
    Aborted,
}

impl MonitorPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

/// Reason for closing a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Price fell through the trailing stop.
    TrailingStop,
    /// Price fell through the breakeven floor.
    BreakevenStop,
    /// Market closed with the position still open.
    EndOfDay,
    /// Broker holding with no persisted record.
    GhostPosition,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrailingStop => write!(f, "trailing_stop"),
            Self::BreakevenStop => write!(f, "breakeven_stop"),
            Self::EndOfDay => write!(f, "end_of_day"),
            Self::GhostPosition => write!(f, "ghost_position"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sentinel_broker::OptionRight;

    fn position() -> Position {
        let contract = ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        );
        Position::opened(contract, dec!(2.00), 3, dec!(10), Regime::Trend)
    }

    #[test]
    fn classify_uses_strict_threshold() {
        assert_eq!(Regime::classify(Some(dec!(25.1)), dec!(25)), Regime::Reversion);
        assert_eq!(Regime::classify(Some(dec!(25)), dec!(25)), Regime::Trend);
        assert_eq!(Regime::classify(None, dec!(25)), Regime::Trend);
    }

    #[test]
    fn regime_round_trips_through_text() {
        assert_eq!("reversion".parse::<Regime>().unwrap(), Regime::Reversion);
        assert_eq!(Regime::Trend.to_string(), "TREND");
        assert_eq!(serde_json::to_string(&Regime::Reversion).unwrap(), "\"REVERSION\"");
    }

    #[test]
    fn gain_is_relative_to_entry() {
        let pos = position();
        assert_eq!(pos.gain_pct(dec!(2.40)), Some(dec!(20)));
        assert_eq!(pos.gain_pct(dec!(1.50)), Some(dec!(-25)));
    }

    #[test]
    fn gain_out_of_range_is_none() {
        let mut pos = position();
        assert_eq!(pos.gain_pct(Decimal::MAX), None);

        pos.entry_price = Decimal::new(1, 28);
        pos.highest_price = pos.entry_price;
        assert_eq!(pos.gain_pct(dec!(2.00)), None);

        pos.entry_price = Decimal::ZERO;
        assert_eq!(pos.gain_pct(dec!(2.00)), None);
    }

    #[test]
    fn close_reasons_render_for_logs() {
        assert_eq!(CloseReason::TrailingStop.to_string(), "trailing_stop");
        assert_eq!(CloseReason::BreakevenStop.to_string(), "breakeven_stop");
        assert_eq!(CloseReason::EndOfDay.to_string(), "end_of_day");
        assert_eq!(CloseReason::GhostPosition.to_string(), "ghost_position");
    }

    #[test]
    fn phase_follows_flags() {
        let mut pos = position();
        assert_eq!(pos.phase(), MonitorPhase::Initial);
        pos.breakeven_activated = true;
        assert_eq!(pos.phase(), MonitorPhase::BreakevenActive);
        pos.profit_lock_activated = true;
        assert_eq!(pos.phase(), MonitorPhase::ProfitLockActive);
    }

    #[test]
    fn invariants_reject_profit_lock_without_breakeven() {
        let mut pos = position();
        assert!(pos.check_invariants().is_ok());
        pos.profit_lock_activated = true;
        assert!(pos.check_invariants().is_err());
    }

    #[test]
    fn invariants_reject_high_below_entry() {
        let mut pos = position();
        pos.highest_price = dec!(1.90);
        assert!(pos.check_invariants().is_err());
    }
}
