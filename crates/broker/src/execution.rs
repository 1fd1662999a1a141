//! Order execution: place market orders and wait for fill confirmation.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BrokerError;
use crate::traits::Broker;
use crate::types::{Fill, MarketOrder, OrderHandle, OrderStatus};

/// How an order ended up after waiting for it.
#[derive(Debug, Clone)]
pub enum FillOutcome {
    Filled(Fill),
    Rejected { reason: String },
    /// Still working when the wait expired.
    TimedOut,
}

/// Poll `order_status` until the order fills, is rejected, or `timeout` passes.
pub async fn await_fill(
    broker: &dyn Broker,
    handle: &OrderHandle,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<FillOutcome, BrokerError> {
    let deadline = Instant::now() + timeout;

    loop {
        match broker.order_status(handle).await? {
            OrderStatus::Filled(fill) => {
                info!(
                    order_id = fill.order_id,
                    price = %fill.avg_fill_price,
                    quantity = fill.quantity,
                    "Order filled"
                );
                return Ok(FillOutcome::Filled(fill));
            }
            OrderStatus::Rejected { reason } => {
                warn!(order_id = handle.order_id, reason, "Order rejected");
                return Ok(FillOutcome::Rejected { reason });
            }
            OrderStatus::Pending => {
                debug!(order_id = handle.order_id, "Order still working");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                order_id = handle.order_id,
                timeout_secs = timeout.as_secs(),
                "Order not filled before timeout"
            );
            return Ok(FillOutcome::TimedOut);
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Submit a market order and wait for its fill.
pub async fn submit_and_confirm(
    broker: &dyn Broker,
    order: &MarketOrder,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(OrderHandle, FillOutcome), BrokerError> {
    info!(
        contract = %order.contract.display_name(),
        side = %order.side,
        quantity = order.quantity,
        "Placing market order"
    );

    let handle = broker.place_market_order(order).await?;
    let outcome = await_fill(broker, &handle, timeout, poll_interval).await?;
    Ok((handle, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{FillMode, PaperBroker};
    use crate::types::{ContractIdentity, OptionRight, OrderSide, QuoteSnapshot};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn setup(mode: FillMode) -> (PaperBroker, MarketOrder) {
        let broker = PaperBroker::new(dec!(100000));
        let contract = broker.list_contract(ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        ));
        broker.push_quotes(&contract, [QuoteSnapshot::last(dec!(2.00))]);
        broker.set_fill_mode(mode);
        let order = MarketOrder {
            contract,
            side: OrderSide::Buy,
            quantity: 2,
        };
        (broker, order)
    }

    #[tokio::test]
    async fn immediate_fill_is_confirmed() {
        let (broker, order) = setup(FillMode::Immediate);
        let (_, outcome) =
            submit_and_confirm(&broker, &order, Duration::from_secs(60), Duration::from_secs(1))
                .await
                .unwrap();
        match outcome {
            FillOutcome::Filled(fill) => {
                assert_eq!(fill.quantity, 2);
                assert_eq!(fill.avg_fill_price, dec!(2.00));
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejection_is_reported() {
        let (broker, order) = setup(FillMode::Reject);
        let (_, outcome) =
            submit_and_confirm(&broker, &order, Duration::from_secs(60), Duration::from_secs(1))
                .await
                .unwrap();
        assert!(matches!(outcome, FillOutcome::Rejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_order_times_out() {
        let (broker, order) = setup(FillMode::Never);
        let started = Instant::now();
        let (_, outcome) =
            submit_and_confirm(&broker, &order, Duration::from_secs(60), Duration::from_secs(1))
                .await
                .unwrap();
        assert!(matches!(outcome, FillOutcome::TimedOut));
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn disconnect_propagates() {
        let (broker, order) = setup(FillMode::Immediate);
        broker.set_connected(false);
        let result =
            submit_and_confirm(&broker, &order, Duration::from_secs(60), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(e) if e.is_disconnect()));
    }
}
