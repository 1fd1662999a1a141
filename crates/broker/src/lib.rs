//! Broker collaborators for single-position options trading.
//!
//! Defines the contract identity and order types shared with the position
//! manager, the `Broker` / `PriceFeed` seams, fill confirmation, and an
//! in-memory paper broker for dry runs and tests.

pub mod error;
pub mod execution;
pub mod paper;
pub mod traits;
pub mod types;

pub use error::BrokerError;
pub use execution::{await_fill, submit_and_confirm, FillOutcome};
pub use paper::{FillMode, PaperBroker};
pub use traits::{Broker, PriceFeed};
pub use types::{
    ContractIdentity, Fill, Holding, MarketOrder, OptionRight, OrderHandle, OrderSide, OrderStatus,
    QuoteSnapshot,
};
