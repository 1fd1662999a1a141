//! Supervision loop: reconcile, monitor, and enter, one cycle at a time.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use sentinel_broker::BrokerError;
use sentinel_core::Severity;

use crate::executor::{open_position, EntryOutcome, SignalSource};
use crate::monitor::{MonitorOutcome, PositionMonitor};
use crate::reconciler::{reconcile, ReconcileOutcome};
use crate::session::Session;

/// What one supervision cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A position was monitored until this outcome.
    Managed(MonitorOutcome),
    /// Persisted contract no longer resolved; state was cleared.
    Cleared,
    /// Ghost positions were found and closed. No entry this cycle.
    GhostsClosed { found: usize, closed: usize },
    /// Flat, but the market is closed.
    MarketClosed,
    /// Flat and no entry signal.
    NoSignal,
    EntrySkipped { reason: String },
    /// The broker session dropped; the cycle was abandoned.
    BrokerUnavailable,
}

/// Owns the session and runs supervision cycles.
pub struct Supervisor {
    session: Session,
    signals: Arc<dyn SignalSource>,
}

impl Supervisor {
    pub fn new(session: Session, signals: Arc<dyn SignalSource>) -> Self {
        Self { session, signals }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs one cycle: reconcile, then either monitor the recovered position
    /// or consider a new entry.
    ///
    /// # Errors
    ///
    /// Unexpected failures are returned. Broker disconnects are not errors:
    /// they end the cycle as [`CycleOutcome::BrokerUnavailable`].
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let reconciled = match reconcile(&self.session).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_disconnect() => return Ok(self.broker_unavailable(&e).await),
            Err(e) => return Err(e).context("reconciliation failed"),
        };

        match reconciled {
            ReconcileOutcome::Resume { position, targets } => {
                let mut monitor = PositionMonitor::new(&self.session, position, targets);
                Ok(CycleOutcome::Managed(monitor.run().await))
            }
            ReconcileOutcome::Cleared { .. } => Ok(CycleOutcome::Cleared),
            ReconcileOutcome::GhostsClosed { found, closed } => {
                Ok(CycleOutcome::GhostsClosed { found, closed })
            }
            ReconcileOutcome::Flat => self.consider_entry().await,
        }
    }

    async fn consider_entry(&self) -> Result<CycleOutcome> {
        if !self.session.clock.is_open() {
            info!("Market closed, no new entries");
            return Ok(CycleOutcome::MarketClosed);
        }

        let Some(signal) = self
            .signals
            .next_signal()
            .await
            .context("signal source failed")?
        else {
            info!("No entry signal this cycle");
            return Ok(CycleOutcome::NoSignal);
        };

        let outcome = match open_position(&self.session, &signal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(broker_err) = e.downcast_ref::<BrokerError>() {
                    if broker_err.is_disconnect() {
                        return Ok(self.broker_unavailable(broker_err).await);
                    }
                }
                return Err(e.context("entry failed"));
            }
        };

        match outcome {
            EntryOutcome::Opened(position) => {
                let targets = self.session.config.regimes.targets_for(position.regime);
                let mut monitor = PositionMonitor::new(&self.session, position, targets);
                Ok(CycleOutcome::Managed(monitor.run().await))
            }
            EntryOutcome::Skipped { reason } => Ok(CycleOutcome::EntrySkipped { reason }),
        }
    }

    async fn broker_unavailable(&self, e: &BrokerError) -> CycleOutcome {
        warn!(error = %e, "Broker unavailable, aborting cycle");
        self.session
            .alert(
                Severity::Warning,
                "Broker Disconnected",
                &format!("Supervision cycle aborted: {e}. Retrying next cycle."),
            )
            .await;
        CycleOutcome::BrokerUnavailable
    }

    /// Runs cycles forever, one per `supervisor.cycle_interval_secs`.
    ///
    /// A failing cycle is alerted and the loop carries on.
    pub async fn run(&self) {
        info!(
            symbol = %self.session.config.universe.symbol,
            cycle_secs = self.session.config.supervisor.cycle_interval_secs,
            poll_secs = self.session.config.monitor.poll_interval_secs,
            state = %self.session.store.path().display(),
            "Supervisor started"
        );

        let mut interval = tokio::time::interval(self.session.config.cycle_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.run_cycle().await {
                Ok(outcome) => info!(?outcome, "Cycle complete"),
                Err(e) => {
                    error!(error = format!("{e:#}"), "Cycle failed");
                    self.session
                        .alert(Severity::Critical, "Supervisor Cycle Error", &format!("{e:#}"))
                        .await;
                }
            }
        }
    }
}
