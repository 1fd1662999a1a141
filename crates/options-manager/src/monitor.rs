//! Position monitor: the per-tick state machine for the open position.
//!
//! Each poll checks the market clock, fetches a price, ratchets the high,
//! arms profit targets, persists on change and compares against the stop.
//! [`evaluate_tick`] holds the pure part so it can be tested without I/O.

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use sentinel_core::Severity;

use crate::closer::{close_position, CloseOutcome};
use crate::session::Session;
use crate::stops::active_stop;
use crate::targets::apply_profit_targets;
use crate::types::{CloseReason, MonitorPhase, Position, ProfitTargets};

/// Result of applying one price to the position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickEvaluation {
    pub price: Decimal,
    pub gain_pct: Decimal,
    pub new_high: bool,
    pub breakeven_armed: bool,
    pub profit_lock_armed: bool,
    pub stop_price: Decimal,
    pub stop_hit: bool,
    /// Which leg of the stop binds at this tick.
    pub stop_reason: CloseReason,
}

impl TickEvaluation {
    /// Whether any persisted field changed.
    #[must_use]
    pub fn state_changed(&self) -> bool {
        self.new_high || self.breakeven_armed || self.profit_lock_armed
    }
}

/// Applies a valid price to the position: high-water mark, profit targets,
/// then the stop comparison.
///
/// Returns `None` and leaves the position untouched when the price puts any
/// of the derived levels out of `Decimal` range.
pub fn evaluate_tick(
    position: &mut Position,
    price: Decimal,
    targets: &ProfitTargets,
    breakeven_buffer_pct: Decimal,
) -> Option<TickEvaluation> {
    let gain_pct = position.gain_pct(price)?;

    let mut next = position.clone();
    let new_high = price > next.highest_price;
    if new_high {
        next.highest_price = price;
    }
    let update = apply_profit_targets(&mut next, gain_pct, targets);
    let (stop_price, stop_reason) = active_stop(&next, breakeven_buffer_pct)?;

    *position = next;
    Some(TickEvaluation {
        price,
        gain_pct,
        new_high,
        breakeven_armed: update.breakeven_armed,
        profit_lock_armed: update.profit_lock_armed,
        stop_price,
        stop_hit: price <= stop_price,
        stop_reason,
    })
}

/// Why monitoring stopped without a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Persisted entry price is zero or negative.
    InvalidEntryPrice,
    /// Price feed reported the broker session as gone.
    BrokerDisconnected,
}

/// How a monitoring run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Position is flat.
    Closed { reason: CloseReason },
    /// Close was attempted but not confirmed. State is retained.
    CloseFailed { reason: CloseReason, detail: String },
    Aborted { reason: AbortReason },
}

/// Drives one position from resume or entry until it is closed or aborted.
pub struct PositionMonitor<'a> {
    session: &'a Session,
    position: Position,
    targets: ProfitTargets,
    phase: MonitorPhase,
}

impl<'a> PositionMonitor<'a> {
    pub fn new(session: &'a Session, position: Position, targets: ProfitTargets) -> Self {
        let phase = position.phase();
        Self {
            session,
            position,
            targets,
            phase,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Polls until a terminal phase is reached.
    pub async fn run(&mut self) -> MonitorOutcome {
        info!(
            contract = %self.position.contract_identity.display_name(),
            phase = ?self.phase,
            poll_secs = self.session.config.monitor.poll_interval_secs,
            "Monitoring position"
        );

        loop {
            if let Some(outcome) = self.step().await {
                return outcome;
            }
            tokio::time::sleep(self.session.config.poll_interval()).await;
        }
    }

    /// One polling iteration. `None` means keep polling; a no-op once terminal.
    pub async fn step(&mut self) -> Option<MonitorOutcome> {
        if self.phase.is_terminal() {
            return None;
        }

        if !self.session.clock.is_open() {
            info!(
                contract = %self.position.contract_identity.display_name(),
                "Market closed, flattening position"
            );
            return Some(self.close(CloseReason::EndOfDay).await);
        }

        if self.position.entry_price <= Decimal::ZERO {
            return Some(self.abort_invalid_entry().await);
        }

        let fetched = self.session.feed.snapshot(&self.position.contract_identity).await;
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_disconnect() => return Some(self.abort_disconnected(&e.to_string()).await),
            Err(e) => {
                warn!(error = %e, "Price fetch failed, skipping tick");
                return None;
            }
        };
        let Some(price) = snapshot.mark_price() else {
            debug!(?snapshot, "No valid price in snapshot, skipping tick");
            return None;
        };

        let Some(eval) = evaluate_tick(
            &mut self.position,
            price,
            &self.targets,
            self.session.config.monitor.breakeven_buffer_pct,
        ) else {
            warn!(
                contract = %self.position.contract_identity.display_name(),
                price = %price,
                entry = %self.position.entry_price,
                "Price out of range for this position, skipping tick"
            );
            return None;
        };
        self.phase = self.position.phase();

        debug!(
            price = %eval.price,
            gain_pct = %eval.gain_pct.round_dp(2),
            highest = %self.position.highest_price,
            stop = %eval.stop_price,
            phase = ?self.phase,
            "Tick"
        );
        if eval.new_high {
            info!(high = %self.position.highest_price, "New high");
        }
        if eval.state_changed() {
            self.persist().await;
        }

        if eval.stop_hit {
            warn!(
                contract = %self.position.contract_identity.display_name(),
                price = %eval.price,
                stop = %eval.stop_price,
                reason = %eval.stop_reason,
                "Stop hit"
            );
            return Some(self.close(eval.stop_reason).await);
        }

        None
    }

    async fn persist(&self) {
        if let Err(e) = self.session.store.persist(&self.position) {
            error!(error = %e, "Failed to persist position state");
            self.session
                .alert(
                    Severity::Warning,
                    "State Persist Failed",
                    &format!(
                        "Could not save {} to {}: {e}",
                        self.position.contract_identity.display_name(),
                        self.session.store.path().display()
                    ),
                )
                .await;
        }
    }

    async fn close(&mut self, reason: CloseReason) -> MonitorOutcome {
        self.phase = MonitorPhase::Closing;
        let name = self.position.contract_identity.display_name();

        let detail = match close_position(self.session, &self.position, reason).await {
            Ok(outcome) if outcome.is_success() => {
                self.phase = MonitorPhase::Closed;
                return MonitorOutcome::Closed { reason };
            }
            Ok(CloseOutcome::NotFilled { reason: detail }) => detail,
            Ok(_) => String::from("close not confirmed"),
            Err(e) => e.to_string(),
        };

        error!(contract = %name, reason = %reason, detail, "Stop close unconfirmed, monitoring stopped");
        self.session
            .alert(
                Severity::Critical,
                &format!("Stop Loss Close Unconfirmed - {name}"),
                &format!(
                    "Attempted to close {name} ({reason}) but it was not confirmed: {detail}. \
                     State retained; reconciliation will retry next cycle."
                ),
            )
            .await;
        self.phase = MonitorPhase::Aborted;
        MonitorOutcome::CloseFailed { reason, detail }
    }

    async fn abort_invalid_entry(&mut self) -> MonitorOutcome {
        let name = self.position.contract_identity.display_name();
        error!(contract = %name, entry = %self.position.entry_price, "Invalid entry price, aborting monitor");
        self.session
            .alert(
                Severity::Critical,
                &format!("Invalid Entry Price - {name}"),
                &format!(
                    "Entry price {} is not positive. Monitoring stopped; manual review required.",
                    self.position.entry_price
                ),
            )
            .await;
        self.phase = MonitorPhase::Aborted;
        MonitorOutcome::Aborted {
            reason: AbortReason::InvalidEntryPrice,
        }
    }

    async fn abort_disconnected(&mut self, detail: &str) -> MonitorOutcome {
        warn!(error = detail, "Broker disconnected while monitoring, aborting cycle");
        self.session
            .alert(
                Severity::Warning,
                "Broker Disconnected",
                &format!(
                    "Lost the broker session while monitoring {}: {detail}. \
                     State retained for the next cycle.",
                    self.position.contract_identity.display_name()
                ),
            )
            .await;
        self.phase = MonitorPhase::Aborted;
        MonitorOutcome::Aborted {
            reason: AbortReason::BrokerDisconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::types::Regime;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sentinel_broker::{ContractIdentity, OptionRight, PaperBroker, QuoteSnapshot};
    use sentinel_core::{ManualClock, MemoryNotifier};
    use std::sync::Arc;
    use tempfile::TempDir;

    const BUFFER: Decimal = dec!(0.5);

    fn scenario_targets() -> ProfitTargets {
        ProfitTargets {
            target_1_gain_pct: dec!(20),
            target_2_gain_pct: dec!(40),
            tightened_stop_pct: dec!(5),
        }
    }

    fn contract() -> ContractIdentity {
        ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        )
    }

    fn scenario_position() -> Position {
        Position::opened(contract(), dec!(2.00), 1, dec!(10), Regime::Trend)
    }

    // =========================================================================
    // Pure tick evaluation
    // =========================================================================

    #[test]
    fn scenario_a_breakeven_without_close() {
        let mut pos = scenario_position();
        let targets = scenario_targets();

        let first = evaluate_tick(&mut pos, dec!(2.00), &targets, BUFFER).unwrap();
        assert!(!first.state_changed());
        assert!(!first.stop_hit);

        evaluate_tick(&mut pos, dec!(2.10), &targets, BUFFER).unwrap();
        let at_target = evaluate_tick(&mut pos, dec!(2.40), &targets, BUFFER).unwrap();
        assert!(at_target.breakeven_armed);
        assert!(!at_target.profit_lock_armed);
        assert_eq!(at_target.stop_price, dec!(2.16));

        for price in [dec!(2.30), dec!(2.28)] {
            let eval = evaluate_tick(&mut pos, price, &targets, BUFFER).unwrap();
            assert!(!eval.stop_hit);
            assert!(!eval.state_changed());
            assert_eq!(eval.stop_price, dec!(2.16));
        }
        assert_eq!(pos.highest_price, dec!(2.40));
        assert_eq!(pos.phase(), MonitorPhase::BreakevenActive);
    }

    #[test]
    fn scenario_b_profit_lock_then_stop() {
        let mut pos = scenario_position();
        let targets = scenario_targets();
        for price in [dec!(2.00), dec!(2.10), dec!(2.40), dec!(2.30), dec!(2.28)] {
            evaluate_tick(&mut pos, price, &targets, BUFFER).unwrap();
        }

        let lock = evaluate_tick(&mut pos, dec!(2.80), &targets, BUFFER).unwrap();
        assert!(lock.profit_lock_armed);
        assert!(pos.profit_lock_activated);
        assert_eq!(pos.trailing_percent, dec!(5));
        assert_eq!(lock.stop_price, dec!(2.66));
        assert!(!lock.stop_hit);

        let exit = evaluate_tick(&mut pos, dec!(2.60), &targets, BUFFER).unwrap();
        assert!(exit.stop_hit);
        assert_eq!(exit.stop_reason, CloseReason::TrailingStop);
    }

    #[test]
    fn gap_down_through_floor_reports_breakeven_stop() {
        let mut pos = Position::opened(contract(), dec!(2.00), 1, dec!(20), Regime::Reversion);
        let targets = scenario_targets();
        let armed = evaluate_tick(&mut pos, dec!(2.40), &targets, BUFFER).unwrap();
        assert!(armed.breakeven_armed);

        // Trailing leg sits at 1.92, so the floor binds.
        let eval = evaluate_tick(&mut pos, dec!(1.95), &targets, BUFFER).unwrap();
        assert!(eval.stop_hit);
        assert_eq!(eval.stop_price, dec!(2.01));
        assert_eq!(eval.stop_reason, CloseReason::BreakevenStop);
    }

    #[test]
    fn out_of_range_tick_leaves_position_untouched() {
        let mut pos = scenario_position();
        assert_eq!(evaluate_tick(&mut pos, Decimal::MAX, &scenario_targets(), BUFFER), None);
        assert_eq!(pos, scenario_position());

        let mut tiny = Position::opened(contract(), Decimal::new(1, 28), 1, dec!(10), Regime::Trend);
        let before = tiny.clone();
        assert_eq!(evaluate_tick(&mut tiny, dec!(2.00), &scenario_targets(), BUFFER), None);
        assert_eq!(tiny, before);
    }

    #[test]
    fn new_high_alone_is_a_state_change() {
        let mut pos = scenario_position();
        let eval = evaluate_tick(&mut pos, dec!(2.05), &scenario_targets(), BUFFER).unwrap();
        assert!(eval.new_high);
        assert!(eval.state_changed());
    }

    // =========================================================================
    // Monitor loop
    // =========================================================================

    struct Harness {
        _dir: TempDir,
        broker: Arc<PaperBroker>,
        clock: Arc<ManualClock>,
        notifier: Arc<MemoryNotifier>,
        session: Session,
        position: Position,
    }

    fn harness(prices: &[Decimal]) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = ManagerConfig::default();
        config.state.path = dir.path().join("trade_state.json");

        let broker = Arc::new(PaperBroker::new(dec!(100000)));
        let listed = broker.list_contract(contract());
        broker.set_holding(&listed, 1, dec!(2.00));
        broker.push_quotes(&listed, prices.iter().copied().map(QuoteSnapshot::last));

        let clock = Arc::new(ManualClock::new(true));
        let notifier = Arc::new(MemoryNotifier::new());
        let session = Session::paper(broker.clone(), clock.clone(), notifier.clone(), config);
        let position = Position::opened(listed, dec!(2.00), 1, dec!(10), Regime::Trend);
        session.store.persist(&position).unwrap();

        Harness {
            _dir: dir,
            broker,
            clock,
            notifier,
            session,
            position,
        }
    }

    #[tokio::test]
    async fn persists_armed_flags_on_change() {
        let h = harness(&[dec!(2.10), dec!(2.40)]);
        let mut monitor = PositionMonitor::new(&h.session, h.position.clone(), scenario_targets());

        assert!(monitor.step().await.is_none());
        assert!(monitor.step().await.is_none());

        assert_eq!(monitor.phase(), MonitorPhase::BreakevenActive);
        let saved = h.session.store.load().unwrap();
        assert!(saved.breakeven_activated);
        assert_eq!(saved.highest_price, dec!(2.40));
    }

    #[tokio::test]
    async fn missing_price_skips_tick() {
        let h = harness(&[]);
        let mut monitor = PositionMonitor::new(&h.session, h.position.clone(), scenario_targets());

        assert!(monitor.step().await.is_none());
        assert_eq!(monitor.position(), &h.position);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn tiny_persisted_entry_skips_ticks() {
        let h = harness(&[dec!(2.10), dec!(2.20)]);
        let mut tiny = h.position.clone();
        tiny.entry_price = Decimal::new(1, 28);
        tiny.highest_price = tiny.entry_price;
        h.session.store.persist(&tiny).unwrap();
        let loaded = h.session.store.load().unwrap();
        let mut monitor = PositionMonitor::new(&h.session, loaded, scenario_targets());

        assert!(monitor.step().await.is_none());
        assert!(monitor.step().await.is_none());

        assert_eq!(monitor.position(), &tiny);
        assert_eq!(monitor.phase(), MonitorPhase::Initial);
        assert!(h.broker.orders().is_empty());
        assert_eq!(h.session.store.load(), Some(tiny));
    }

    #[tokio::test]
    async fn market_close_forces_exit() {
        let h = harness(&[dec!(2.50)]);
        h.clock.set_open(false);
        let mut monitor = PositionMonitor::new(&h.session, h.position.clone(), scenario_targets());

        let outcome = monitor.step().await;

        assert_eq!(
            outcome,
            Some(MonitorOutcome::Closed {
                reason: CloseReason::EndOfDay
            })
        );
        assert_eq!(monitor.phase(), MonitorPhase::Closed);
        assert!(h.session.store.load().is_none());
        assert!(h.broker.holdings().is_empty());
    }

    #[tokio::test]
    async fn invalid_entry_aborts_critically() {
        let h = harness(&[dec!(2.50)]);
        let mut bad = h.position.clone();
        bad.entry_price = Decimal::ZERO;
        let mut monitor = PositionMonitor::new(&h.session, bad, scenario_targets());

        let outcome = monitor.step().await;

        assert_eq!(
            outcome,
            Some(MonitorOutcome::Aborted {
                reason: AbortReason::InvalidEntryPrice
            })
        );
        assert_eq!(monitor.phase(), MonitorPhase::Aborted);
        assert_eq!(h.notifier.count(Severity::Critical), 1);
        assert!(h.broker.orders().is_empty());
    }

    #[tokio::test]
    async fn disconnect_aborts_with_warning() {
        let h = harness(&[dec!(2.50)]);
        h.broker.set_connected(false);
        let mut monitor = PositionMonitor::new(&h.session, h.position.clone(), scenario_targets());

        let outcome = monitor.step().await;

        assert_eq!(
            outcome,
            Some(MonitorOutcome::Aborted {
                reason: AbortReason::BrokerDisconnected
            })
        );
        assert_eq!(h.notifier.count(Severity::Warning), 1);
        assert!(h.session.store.load().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_stop() {
        let h = harness(&[
            dec!(2.00),
            dec!(2.10),
            dec!(2.40),
            dec!(2.30),
            dec!(2.28),
            dec!(2.80),
            dec!(2.60),
        ]);
        let mut monitor = PositionMonitor::new(&h.session, h.position.clone(), scenario_targets());

        let outcome = monitor.run().await;

        assert_eq!(
            outcome,
            MonitorOutcome::Closed {
                reason: CloseReason::TrailingStop
            }
        );
        assert_eq!(h.broker.remaining_quotes(&h.position.contract_identity), 0);
        assert!(h.session.store.load().is_none());
        let orders = h.broker.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].quantity, 1);
    }
}
