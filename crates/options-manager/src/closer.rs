//! Position closer: flatten the broker-side holding with one market order.
//!
//! Calling it twice for the same logical close is safe. The second call
//! finds no holding and succeeds trivially.

use tracing::{error, info, warn};

use sentinel_broker::{
    submit_and_confirm, BrokerError, ContractIdentity, Fill, FillOutcome, MarketOrder, OrderSide,
};
use sentinel_core::Severity;

use crate::session::Session;
use crate::types::{CloseReason, Position};

/// How a close attempt ended.
#[derive(Debug, Clone)]
pub enum CloseOutcome {
    /// The closing order filled.
    Filled(Fill),
    /// No matching holding at the broker; treated as already closed.
    AlreadyFlat,
    /// Rejected or still working at the timeout. State is left untouched.
    NotFilled { reason: String },
}

impl CloseOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Filled(_) | Self::AlreadyFlat)
    }
}

/// Closes the managed position.
pub async fn close_position(
    session: &Session,
    position: &Position,
    reason: CloseReason,
) -> Result<CloseOutcome, BrokerError> {
    close_contract(session, &position.contract_identity, reason).await
}

/// Closes whatever the broker holds in `contract`.
///
/// # Errors
///
/// Broker request failures (including disconnects) before an order is
/// confirmed are returned as-is. Persisted state is not touched in that case.
pub async fn close_contract(
    session: &Session,
    contract: &ContractIdentity,
    reason: CloseReason,
) -> Result<CloseOutcome, BrokerError> {
    let name = contract.display_name();
    let holdings = session.broker.positions().await?;

    let Some(holding) = holdings
        .into_iter()
        .find(|h| h.quantity != 0 && h.contract.matches(contract))
    else {
        info!(contract = %name, reason = %reason, "No broker position found, treating as closed");
        clear_state(session).await;
        session
            .alert(
                Severity::Info,
                &format!("Position Already Closed - {name}"),
                &format!(
                    "No broker position matched {name} while closing ({reason}). \
                     It was likely closed outside the manager (expiry or manual exit)."
                ),
            )
            .await;
        return Ok(CloseOutcome::AlreadyFlat);
    };

    let order = MarketOrder {
        contract: holding.contract.clone(),
        side: OrderSide::closing(holding.quantity),
        quantity: holding.quantity.unsigned_abs(),
    };
    info!(
        contract = %name,
        reason = %reason,
        side = %order.side,
        quantity = order.quantity,
        "Submitting close order"
    );

    let (handle, outcome) = submit_and_confirm(
        session.broker.as_ref(),
        &order,
        session.config.fill_timeout(),
        session.config.fill_poll_interval(),
    )
    .await?;

    match outcome {
        FillOutcome::Filled(fill) => {
            info!(
                contract = %name,
                reason = %reason,
                price = %fill.avg_fill_price,
                quantity = fill.quantity,
                "Position closed"
            );
            clear_state(session).await;
            session
                .alert(
                    Severity::Info,
                    &format!("Position Closed - {name}"),
                    &format!(
                        "{} {} x{} filled at {} ({reason})",
                        order.side, name, fill.quantity, fill.avg_fill_price
                    ),
                )
                .await;
            Ok(CloseOutcome::Filled(fill))
        }
        FillOutcome::Rejected { reason: rejection } => {
            let detail = format!("order {} rejected: {rejection}", handle.order_id);
            unconfirmed(session, contract, reason, detail).await
        }
        FillOutcome::TimedOut => {
            // A stale market order must not fill after the next cycle re-closes.
            if let Err(e) = session.broker.cancel_order(&handle).await {
                warn!(order_id = handle.order_id, error = %e, "Failed to cancel unfilled close order");
            }
            let detail = format!(
                "order {} not filled within {}s",
                handle.order_id,
                session.config.fill_timeout().as_secs()
            );
            unconfirmed(session, contract, reason, detail).await
        }
    }
}

/// The order was not confirmed, but the holding may still be gone (a fill
/// that raced the cancel, or an exit outside the manager).
async fn unconfirmed(
    session: &Session,
    contract: &ContractIdentity,
    reason: CloseReason,
    detail: String,
) -> Result<CloseOutcome, BrokerError> {
    let name = contract.display_name();
    match session.broker.positions().await {
        Ok(holdings) if !holdings.iter().any(|h| h.quantity != 0 && h.contract.matches(contract)) => {
            info!(contract = %name, reason = %reason, detail, "Holding gone after unconfirmed close");
            clear_state(session).await;
            session
                .alert(
                    Severity::Info,
                    &format!("Position Closed - {name}"),
                    &format!("{name} is flat at the broker ({reason}) although the order was not confirmed: {detail}"),
                )
                .await;
            Ok(CloseOutcome::AlreadyFlat)
        }
        Ok(_) => close_failed(session, &name, reason, detail).await,
        Err(e) => {
            warn!(contract = %name, error = %e, "Could not re-check holdings after unconfirmed close");
            close_failed(session, &name, reason, detail).await
        }
    }
}

async fn close_failed(
    session: &Session,
    name: &str,
    reason: CloseReason,
    detail: String,
) -> Result<CloseOutcome, BrokerError> {
    error!(contract = %name, reason = %reason, detail, "Close order not confirmed");
    session
        .alert(
            Severity::Critical,
            &format!("Close Error - {name}"),
            &format!(
                "Close of {name} ({reason}) was not confirmed: {detail}. \
                 Persisted state retained; manual review required."
            ),
        )
        .await;
    Ok(CloseOutcome::NotFilled { reason: detail })
}

/// The broker is flat at this point, so a failed clear only costs one
/// redundant no-op close on the next cycle.
async fn clear_state(session: &Session) {
    if let Err(e) = session.store.clear() {
        error!(path = %session.store.path().display(), error = %e, "Failed to clear position state");
        session
            .alert(
                Severity::Warning,
                "State Clear Failed",
                &format!("Could not clear {}: {e}", session.store.path().display()),
            )
            .await;
    }
}
