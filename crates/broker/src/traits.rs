use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::BrokerError;
use crate::types::{ContractIdentity, Holding, MarketOrder, OrderHandle, OrderStatus, QuoteSnapshot};

/// Order routing and account queries.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Qualifies a contract. `Ok(None)` means the broker no longer knows it
    /// (expired or invalid).
    async fn resolve(&self, contract: &ContractIdentity) -> Result<Option<ContractIdentity>, BrokerError>;

    async fn positions(&self) -> Result<Vec<Holding>, BrokerError>;

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderHandle, BrokerError>;

    async fn order_status(&self, handle: &OrderHandle) -> Result<OrderStatus, BrokerError>;

    async fn cancel_order(&self, handle: &OrderHandle) -> Result<(), BrokerError>;

    /// Net liquidation value used for position sizing.
    async fn account_equity(&self) -> Result<Decimal, BrokerError>;
}

/// Market data snapshots for a single contract.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn snapshot(&self, contract: &ContractIdentity) -> Result<QuoteSnapshot, BrokerError>;
}
