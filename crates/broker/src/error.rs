//! Error types for broker and price-feed collaborators.

use thiserror::Error;

/// Errors that can occur when talking to the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Session to the broker is down.
    #[error("broker disconnected: {0}")]
    Disconnected(String),

    /// Order rejected by the broker at submission.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Order id unknown to the broker.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The order ID that was not found.
        order_id: String,
    },

    /// Any other request failure.
    #[error("broker request failed: {0}")]
    Request(String),
}

impl BrokerError {
    /// Whether the error means the whole session is unusable.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}
