//! Paper trading broker.
//!
//! Simulates contract resolution, holdings, quotes and order fills in memory
//! without touching a real broker. Quotes are served from a per-contract
//! queue so a recorded tick sequence can be replayed deterministically.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::error::BrokerError;
use crate::traits::{Broker, PriceFeed};
use crate::types::{
    ContractIdentity, Fill, Holding, MarketOrder, OrderHandle, OrderSide, OrderStatus, QuoteSnapshot,
};

/// Per-contract commission charged on simulated fills.
const COMMISSION_PER_CONTRACT: Decimal = dec!(0.65);

/// How submitted orders behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Fill at the current mark on submission.
    Immediate,
    /// Stay pending forever.
    Never,
    /// Reject on first status poll.
    Reject,
    /// Stay pending, then fill when a cancel arrives. The fill wins the race.
    FillsOnCancel,
}

#[derive(Debug)]
struct QuoteStream {
    contract: ContractIdentity,
    queue: VecDeque<QuoteSnapshot>,
    last_mark: Option<Decimal>,
}

#[derive(Debug)]
struct PaperState {
    connected: bool,
    fill_mode: FillMode,
    equity: Decimal,
    next_con_id: i64,
    next_order_id: u64,
    contracts: Vec<ContractIdentity>,
    holdings: Vec<Holding>,
    quotes: Vec<QuoteStream>,
    orders: Vec<MarketOrder>,
    statuses: HashMap<String, OrderStatus>,
    working: HashMap<String, MarketOrder>,
}

impl PaperState {
    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::Disconnected("paper session offline".to_string()))
        }
    }

    fn stream_mut(&mut self, contract: &ContractIdentity) -> Option<&mut QuoteStream> {
        self.quotes.iter_mut().find(|s| s.contract.matches(contract))
    }

    fn fill_price(&mut self, contract: &ContractIdentity) -> Decimal {
        match self.stream_mut(contract) {
            Some(stream) => stream
                .last_mark
                .or_else(|| stream.queue.front().and_then(QuoteSnapshot::mark_price))
                .unwrap_or(Decimal::ZERO),
            None => Decimal::ZERO,
        }
    }

    fn apply_fill(&mut self, fill: &Fill) {
        let signed = match fill.side {
            OrderSide::Buy => fill.quantity as i32,
            OrderSide::Sell => -(fill.quantity as i32),
        };

        if let Some(holding) = self
            .holdings
            .iter_mut()
            .find(|h| h.contract.matches(&fill.contract))
        {
            holding.quantity += signed;
        } else {
            self.holdings.push(Holding {
                contract: fill.contract.clone(),
                quantity: signed,
                average_cost: fill.avg_fill_price,
            });
        }
        self.holdings.retain(|h| h.quantity != 0);
    }

    fn simulate_fill(&mut self, order_id: &str, order: &MarketOrder) -> Fill {
        let fill = Fill {
            order_id: order_id.to_string(),
            contract: order.contract.clone(),
            side: order.side,
            quantity: order.quantity,
            avg_fill_price: self.fill_price(&order.contract),
            commission: COMMISSION_PER_CONTRACT * Decimal::from(order.quantity),
            filled_at: Utc::now(),
        };
        self.apply_fill(&fill);
        info!(
            order_id = fill.order_id,
            contract = %fill.contract.display_name(),
            side = %fill.side,
            price = %fill.avg_fill_price,
            quantity = fill.quantity,
            "Paper fill simulated"
        );
        fill
    }
}

/// In-memory broker and price feed.
#[derive(Debug)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

impl PaperBroker {
    /// Connected paper broker with the given account equity.
    pub fn new(equity: Decimal) -> Self {
        Self {
            state: Mutex::new(PaperState {
                connected: true,
                fill_mode: FillMode::Immediate,
                equity,
                next_con_id: 1000,
                next_order_id: 1,
                contracts: Vec::new(),
                holdings: Vec::new(),
                quotes: Vec::new(),
                orders: Vec::new(),
                statuses: HashMap::new(),
                working: HashMap::new(),
            }),
        }
    }

    /// Makes a contract resolvable and returns it with a broker id assigned.
    pub fn list_contract(&self, contract: ContractIdentity) -> ContractIdentity {
        let mut state = self.state.lock();
        if let Some(existing) = state.contracts.iter().find(|c| c.matches(&contract)) {
            return existing.clone();
        }
        let con_id = state.next_con_id;
        state.next_con_id += 1;
        let listed = contract.with_con_id(con_id);
        state.contracts.push(listed.clone());
        listed
    }

    /// Simulates expiry: the contract no longer resolves.
    pub fn delist_contract(&self, contract: &ContractIdentity) {
        self.state.lock().contracts.retain(|c| !c.matches(contract));
    }

    /// Sets the signed holding for a contract, replacing any existing one.
    pub fn set_holding(&self, contract: &ContractIdentity, quantity: i32, average_cost: Decimal) {
        let mut state = self.state.lock();
        state.holdings.retain(|h| !h.contract.matches(contract));
        if quantity != 0 {
            state.holdings.push(Holding {
                contract: contract.clone(),
                quantity,
                average_cost,
            });
        }
    }

    /// Appends quote snapshots to a contract's replay queue.
    pub fn push_quotes(&self, contract: &ContractIdentity, quotes: impl IntoIterator<Item = QuoteSnapshot>) {
        let mut state = self.state.lock();
        if let Some(stream) = state.stream_mut(contract) {
            stream.queue.extend(quotes);
            return;
        }
        state.quotes.push(QuoteStream {
            contract: contract.clone(),
            queue: quotes.into_iter().collect(),
            last_mark: None,
        });
    }

    /// Quotes not yet served for a contract.
    pub fn remaining_quotes(&self, contract: &ContractIdentity) -> usize {
        self.state
            .lock()
            .quotes
            .iter()
            .find(|s| s.contract.matches(contract))
            .map_or(0, |s| s.queue.len())
    }

    pub fn set_fill_mode(&self, mode: FillMode) {
        self.state.lock().fill_mode = mode;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Every order submitted so far, oldest first.
    pub fn orders(&self) -> Vec<MarketOrder> {
        self.state.lock().orders.clone()
    }

    /// Current holdings.
    pub fn holdings(&self) -> Vec<Holding> {
        self.state.lock().holdings.clone()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn resolve(&self, contract: &ContractIdentity) -> Result<Option<ContractIdentity>, BrokerError> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(state.contracts.iter().find(|c| c.matches(contract)).cloned())
    }

    async fn positions(&self) -> Result<Vec<Holding>, BrokerError> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(state.holdings.clone())
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderHandle, BrokerError> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        if order.quantity == 0 {
            return Err(BrokerError::OrderRejected("quantity must be positive".to_string()));
        }

        let order_id = format!("PAPER-{}", state.next_order_id);
        state.next_order_id += 1;
        state.orders.push(order.clone());

        let status = match state.fill_mode {
            FillMode::Immediate => OrderStatus::Filled(state.simulate_fill(&order_id, order)),
            FillMode::Never => OrderStatus::Pending,
            FillMode::FillsOnCancel => {
                state.working.insert(order_id.clone(), order.clone());
                OrderStatus::Pending
            }
            FillMode::Reject => OrderStatus::Rejected {
                reason: "paper broker configured to reject".to_string(),
            },
        };
        state.statuses.insert(order_id.clone(), status);

        Ok(OrderHandle { order_id })
    }

    async fn order_status(&self, handle: &OrderHandle) -> Result<OrderStatus, BrokerError> {
        let state = self.state.lock();
        state.ensure_connected()?;
        state
            .statuses
            .get(&handle.order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: handle.order_id.clone(),
            })
    }

    async fn cancel_order(&self, handle: &OrderHandle) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        let status = match state.statuses.get(&handle.order_id) {
            Some(status) => status.clone(),
            None => {
                return Err(BrokerError::OrderNotFound {
                    order_id: handle.order_id.clone(),
                })
            }
        };
        if !matches!(status, OrderStatus::Pending) {
            return Ok(());
        }

        let next = match state.working.remove(&handle.order_id) {
            Some(order) => OrderStatus::Filled(state.simulate_fill(&handle.order_id, &order)),
            None => {
                info!(order_id = handle.order_id, "Paper order cancelled");
                OrderStatus::Rejected {
                    reason: "cancelled".to_string(),
                }
            }
        };
        state.statuses.insert(handle.order_id.clone(), next);
        Ok(())
    }

    async fn account_equity(&self) -> Result<Decimal, BrokerError> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(state.equity)
    }
}

#[async_trait]
impl PriceFeed for PaperBroker {
    async fn snapshot(&self, contract: &ContractIdentity) -> Result<QuoteSnapshot, BrokerError> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        let Some(stream) = state.stream_mut(contract) else {
            return Ok(QuoteSnapshot::default());
        };
        let snapshot = stream.queue.pop_front().unwrap_or_default();
        if let Some(mark) = snapshot.mark_price() {
            stream.last_mark = Some(mark);
        }
        Ok(snapshot)
    }
}
