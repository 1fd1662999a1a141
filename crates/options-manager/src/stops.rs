//! Stop price rules: trailing stop with a breakeven floor.

use rust_decimal::Decimal;

use crate::types::{CloseReason, Position};

fn pct(value: Decimal) -> Option<Decimal> {
    value.checked_div(Decimal::ONE_HUNDRED)
}

/// `highest * (1 - trailing/100)`. `None` on overflow.
#[must_use]
pub fn trailing_stop_price(highest_price: Decimal, trailing_pct: Decimal) -> Option<Decimal> {
    highest_price.checked_mul(Decimal::ONE.checked_sub(pct(trailing_pct)?)?)
}

/// Entry plus the cost buffer. Once breakeven is armed the stop never sits below this.
#[must_use]
pub fn breakeven_floor(entry_price: Decimal, buffer_pct: Decimal) -> Option<Decimal> {
    entry_price.checked_mul(Decimal::ONE.checked_add(pct(buffer_pct)?)?)
}

/// Effective stop for a position, with the leg that binds.
#[must_use]
pub fn active_stop(pos: &Position, buffer_pct: Decimal) -> Option<(Decimal, CloseReason)> {
    let trailing = trailing_stop_price(pos.highest_price, pos.trailing_percent)?;
    if !pos.breakeven_activated {
        return Some((trailing, CloseReason::TrailingStop));
    }
    let floor = breakeven_floor(pos.entry_price, buffer_pct)?;
    if floor > trailing {
        Some((floor, CloseReason::BreakevenStop))
    } else {
        Some((trailing, CloseReason::TrailingStop))
    }
}

/// Effective stop price for a position.
#[must_use]
pub fn final_stop_price(pos: &Position, buffer_pct: Decimal) -> Option<Decimal> {
    active_stop(pos, buffer_pct).map(|(price, _)| price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Regime;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sentinel_broker::{ContractIdentity, OptionRight};

    fn make_position(entry: Decimal, highest: Decimal, trailing: Decimal) -> Position {
        let contract = ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        );
        let mut pos = Position::opened(contract, entry, 1, trailing, Regime::Trend);
        pos.highest_price = highest;
        pos
    }

    #[test]
    fn trailing_stop_sits_below_high() {
        assert_eq!(trailing_stop_price(dec!(2.40), dec!(10)), Some(dec!(2.16)));
        assert_eq!(trailing_stop_price(dec!(2.80), dec!(5)), Some(dec!(2.66)));
    }

    #[test]
    fn breakeven_floor_adds_buffer() {
        assert_eq!(breakeven_floor(dec!(2.00), dec!(0.5)), Some(dec!(2.01)));
    }

    #[test]
    fn floor_ignored_until_breakeven_armed() {
        let pos = make_position(dec!(2.00), dec!(2.10), dec!(10));
        assert_eq!(active_stop(&pos, dec!(0.5)), Some((dec!(1.89), CloseReason::TrailingStop)));
    }

    #[test]
    fn floor_binds_when_trailing_is_lower() {
        let mut pos = make_position(dec!(2.00), dec!(2.10), dec!(10));
        pos.breakeven_activated = true;
        assert_eq!(active_stop(&pos, dec!(0.5)), Some((dec!(2.01), CloseReason::BreakevenStop)));
    }

    #[test]
    fn trailing_binds_when_higher_than_floor() {
        let mut pos = make_position(dec!(2.00), dec!(2.40), dec!(10));
        pos.breakeven_activated = true;
        assert_eq!(final_stop_price(&pos, dec!(0.5)), Some(dec!(2.16)));
        assert_eq!(active_stop(&pos, dec!(0.5)).map(|(_, reason)| reason), Some(CloseReason::TrailingStop));
    }

    #[test]
    fn overflowing_levels_are_none() {
        assert_eq!(breakeven_floor(Decimal::MAX, dec!(0.5)), None);
        assert_eq!(trailing_stop_price(Decimal::MAX, Decimal::MAX), None);

        let mut pos = make_position(Decimal::MAX, Decimal::MAX, dec!(10));
        assert!(active_stop(&pos, dec!(0.5)).is_some());
        pos.breakeven_activated = true;
        assert_eq!(active_stop(&pos, dec!(0.5)), None);
    }
}
