//! Entry execution: turn an external signal into a managed position.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use sentinel_broker::{submit_and_confirm, ContractIdentity, FillOutcome, MarketOrder, OrderSide};
use sentinel_core::Severity;

use crate::allocation::{size_position, AllocationCheck};
use crate::session::Session;
use crate::types::{Position, Regime};

/// A request to open a position, produced outside the manager.
#[derive(Debug, Clone)]
pub struct EntrySignal {
    pub contract: ContractIdentity,
    pub regime: Regime,
    /// Free-form reason shown in logs and the trade notification.
    pub rationale: String,
}

/// Source of entry signals, polled once per flat cycle.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn next_signal(&self) -> Result<Option<EntrySignal>>;
}

/// Never signals. Used when the manager only supervises existing state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignals;

#[async_trait]
impl SignalSource for NoSignals {
    async fn next_signal(&self) -> Result<Option<EntrySignal>> {
        Ok(None)
    }
}

/// How an entry attempt ended.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    /// Filled and persisted.
    Opened(Position),
    /// Nothing was written. The reason is also logged.
    Skipped { reason: String },
}

fn skip(reason: String) -> Result<EntryOutcome> {
    warn!(reason, "Entry skipped");
    Ok(EntryOutcome::Skipped { reason })
}

/// Executes an entry signal.
///
/// # Errors
///
/// Broker failures are returned unwrapped so callers can detect
/// disconnects. A fill that cannot be persisted is also an error; the
/// position then shows up as a ghost on the next cycle and is closed.
pub async fn open_position(session: &Session, signal: &EntrySignal) -> Result<EntryOutcome> {
    let name = signal.contract.display_name();
    info!(contract = %name, regime = %signal.regime, rationale = %signal.rationale, "Evaluating entry signal");

    let Some(contract) = session.broker.resolve(&signal.contract).await? else {
        return skip(format!("{name} did not resolve with the broker"));
    };

    let snapshot = session.feed.snapshot(&contract).await?;
    let min_volume = session.config.entry.min_volume;
    match snapshot.volume {
        Some(volume) if volume >= min_volume => {}
        volume => {
            return skip(format!(
                "{name} failed liquidity check: volume {volume:?} below {min_volume}"
            ))
        }
    }
    let Some(price) = snapshot.mark_price() else {
        return skip(format!("{name} has no valid price"));
    };

    let params = session.config.regimes.select(signal.regime);
    let equity = session.broker.account_equity().await?;
    let quantity = match size_position(equity, params.allocation_fraction, price, contract.multiplier) {
        AllocationCheck::Approved {
            quantity,
            allocation_usd,
            committed_usd,
        } => {
            info!(
                contract = %name,
                equity = %equity,
                allocation = %allocation_usd,
                committed = %committed_usd,
                quantity,
                "Position sized"
            );
            quantity
        }
        AllocationCheck::Rejected {
            allocation_usd,
            cost_per_contract,
        } => {
            return skip(format!(
                "allocation {allocation_usd} does not cover one contract at {cost_per_contract}"
            ))
        }
    };

    let order = MarketOrder {
        contract: contract.clone(),
        side: OrderSide::Buy,
        quantity,
    };
    let (handle, outcome) = submit_and_confirm(
        session.broker.as_ref(),
        &order,
        session.config.fill_timeout(),
        session.config.fill_poll_interval(),
    )
    .await?;

    let fill = match outcome {
        FillOutcome::Filled(fill) => fill,
        FillOutcome::Rejected { reason } => return skip(format!("entry order rejected: {reason}")),
        FillOutcome::TimedOut => {
            if let Err(e) = session.broker.cancel_order(&handle).await {
                warn!(order_id = handle.order_id, error = %e, "Failed to cancel unfilled entry order");
            }
            return skip(format!("entry order {} not filled in time", handle.order_id));
        }
    };

    let position = Position::opened(
        contract,
        fill.avg_fill_price,
        fill.quantity,
        params.initial_trailing_pct,
        signal.regime,
    );
    session
        .store
        .persist(&position)
        .with_context(|| format!("failed to persist new position {name}"))?;

    info!(
        contract = %name,
        entry = %position.entry_price,
        quantity = position.quantity,
        trailing_pct = %position.trailing_percent,
        regime = %position.regime,
        "Trade executed"
    );
    session
        .alert(
            Severity::Info,
            &format!("Trade Executed - {name}"),
            &format!(
                "BUY {} x {name} at {} ({} regime, trailing {}%). {}",
                position.quantity,
                position.entry_price,
                position.regime,
                position.trailing_percent,
                signal.rationale
            ),
        )
        .await;

    Ok(EntryOutcome::Opened(position))
}
