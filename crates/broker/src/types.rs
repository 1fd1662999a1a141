//! Core types for broker-side options trading.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

impl std::str::FromStr for OptionRight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" | "call" => Ok(Self::Call),
            "p" | "put" => Ok(Self::Put),
            other => Err(format!("invalid option right: {other}")),
        }
    }
}

/// Everything needed to re-resolve a tradable options contract with the broker.
///
/// `con_id` is the broker's internal id; it is `None` until the contract has
/// been resolved at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractIdentity {
    pub symbol: String,
    pub expiry: NaiveDate,
    pub strike: Decimal,
    pub right: OptionRight,
    /// Exchange routing (e.g., "SMART", "CBOE").
    pub exchange: String,
    pub currency: String,
    /// Contract multiplier (100 for standard US equity options).
    pub multiplier: Decimal,
    pub con_id: Option<i64>,
}

impl ContractIdentity {
    /// Create a new standard US equity options contract.
    pub fn new(symbol: &str, expiry: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            expiry,
            strike,
            right,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            multiplier: Decimal::from(100),
            con_id: None,
        }
    }

    /// Same contract with the broker id filled in.
    #[must_use]
    pub fn with_con_id(mut self, con_id: i64) -> Self {
        self.con_id = Some(con_id);
        self
    }

    /// Human-readable contract description (e.g., "SPY 500C 2026-03-20").
    pub fn display_name(&self) -> String {
        format!("{} {}{} {}", self.symbol, self.strike, self.right, self.expiry)
    }

    /// Whether both identities refer to the same instrument.
    ///
    /// Broker ids win when both sides carry one; otherwise the contract terms
    /// are compared.
    pub fn matches(&self, other: &ContractIdentity) -> bool {
        match (self.con_id, other.con_id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.symbol.eq_ignore_ascii_case(&other.symbol)
                    && self.expiry == other.expiry
                    && self.strike == other.strike
                    && self.right == other.right
            }
        }
    }
}

/// A live holding as reported by the broker. Negative quantity is short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub contract: ContractIdentity,
    pub quantity: i32,
    pub average_cost: Decimal,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side that flattens a holding of the given signed quantity.
    #[must_use]
    pub fn closing(quantity: i32) -> Self {
        if quantity > 0 {
            Self::Sell
        } else {
            Self::Buy
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A market order to place with the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrder {
    pub contract: ContractIdentity,
    pub side: OrderSide,
    pub quantity: u32,
}

/// Broker reference to a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,
}

/// A confirmed fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub contract: ContractIdentity,
    pub side: OrderSide,
    pub quantity: u32,
    pub avg_fill_price: Decimal,
    pub commission: Decimal,
    pub filled_at: DateTime<Utc>,
}

/// Order state as polled from the broker.
#[derive(Debug, Clone)]
pub enum OrderStatus {
    Pending,
    Filled(Fill),
    Rejected { reason: String },
}

/// Quote snapshot. Any field may be missing when the feed has no data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub last: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Option<u64>,
}

impl QuoteSnapshot {
    /// Snapshot carrying only a last trade price.
    #[must_use]
    pub fn last(price: Decimal) -> Self {
        Self {
            last: Some(price),
            ..Self::default()
        }
    }

    /// Usable price: a positive last trade, else the midpoint of a positive
    /// bid and ask.
    pub fn mark_price(&self) -> Option<Decimal> {
        if let Some(last) = self.last.filter(|p| p.is_sign_positive() && !p.is_zero()) {
            return Some(last);
        }
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > Decimal::ZERO && ask > Decimal::ZERO => {
                bid.checked_add(ask)?.checked_div(Decimal::TWO)
            }
            _ => None,
        }
    }
}
