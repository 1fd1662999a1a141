//! Profit target rules: breakeven activation and profit lock.

use rust_decimal::Decimal;
use tracing::warn;

use crate::types::{Position, ProfitTargets};

/// Flags armed by a single price observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetUpdate {
    pub breakeven_armed: bool,
    pub profit_lock_armed: bool,
}

impl TargetUpdate {
    #[must_use]
    pub fn any(self) -> bool {
        self.breakeven_armed || self.profit_lock_armed
    }
}

/// Arms breakeven at target 1 and the profit lock at target 2.
///
/// Both flags are one-way. Arming the profit lock also arms breakeven and
/// tightens `trailing_percent`, never loosening it.
pub fn apply_profit_targets(pos: &mut Position, gain_pct: Decimal, targets: &ProfitTargets) -> TargetUpdate {
    let mut update = TargetUpdate::default();
    let contract = pos.contract_identity.display_name();

    if !pos.breakeven_activated && gain_pct >= targets.target_1_gain_pct {
        pos.breakeven_activated = true;
        update.breakeven_armed = true;
        warn!(
            contract = %contract,
            gain_pct = %gain_pct.round_dp(1),
            entry = %pos.entry_price,
            "Profit target 1 hit, stop floor moved to breakeven"
        );
    }

    if !pos.profit_lock_activated && gain_pct >= targets.target_2_gain_pct {
        pos.profit_lock_activated = true;
        pos.breakeven_activated = true;
        pos.trailing_percent = pos.trailing_percent.min(targets.tightened_stop_pct);
        update.profit_lock_armed = true;
        warn!(
            contract = %contract,
            gain_pct = %gain_pct.round_dp(1),
            trailing_pct = %pos.trailing_percent,
            "Profit target 2 hit, trailing stop tightened"
        );
    }

    update
}
