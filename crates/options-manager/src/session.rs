//! Supervision session: the collaborators every component works through.

use std::sync::Arc;

use sentinel_broker::{Broker, PaperBroker, PriceFeed};
use sentinel_core::{alert, MarketClock, Notifier, Severity};

use crate::config::ManagerConfig;
use crate::state_store::StateStore;

/// Handles scoped to one supervision process.
///
/// Components borrow the session for the duration of a call; nothing keeps
/// a broker or store handle of its own.
#[derive(Clone)]
pub struct Session {
    pub broker: Arc<dyn Broker>,
    pub feed: Arc<dyn PriceFeed>,
    pub clock: Arc<dyn MarketClock>,
    pub notifier: Arc<dyn Notifier>,
    pub store: StateStore,
    pub config: ManagerConfig,
}

impl Session {
    pub fn new(
        broker: Arc<dyn Broker>,
        feed: Arc<dyn PriceFeed>,
        clock: Arc<dyn MarketClock>,
        notifier: Arc<dyn Notifier>,
        config: ManagerConfig,
    ) -> Self {
        let store = StateStore::new(config.state.path.clone());
        Self {
            broker,
            feed,
            clock,
            notifier,
            store,
            config,
        }
    }

    /// Session where the paper broker is both broker and price feed.
    pub fn paper(
        broker: Arc<PaperBroker>,
        clock: Arc<dyn MarketClock>,
        notifier: Arc<dyn Notifier>,
        config: ManagerConfig,
    ) -> Self {
        Self::new(broker.clone(), broker, clock, notifier, config)
    }

    /// Fire-and-forget notification. Delivery failures are only logged.
    pub async fn alert(&self, severity: Severity, subject: &str, body: &str) {
        alert(self.notifier.as_ref(), severity, subject, body).await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("symbol", &self.config.universe.symbol)
            .finish_non_exhaustive()
    }
}
