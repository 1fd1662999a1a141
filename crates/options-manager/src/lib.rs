//! Single-position options risk management.
//!
//! Manages one long option position at a time:
//! - Selects allocation, trailing stop and profit targets by market regime
//! - Ratchets a trailing stop, arms a breakeven floor and a profit lock
//! - Persists every armed state atomically so a restart resumes exactly
//! - Reconciles persisted state against the broker each cycle, force closing
//!   any position it cannot account for
//!
//! All rules are deterministic; prices are exact decimals.

pub mod allocation;
pub mod closer;
pub mod config;
pub mod executor;
pub mod monitor;
pub mod reconciler;
pub mod risk;
pub mod service;
pub mod session;
pub mod state_store;
pub mod stops;
pub mod targets;
pub mod types;

pub use closer::{close_contract, close_position, CloseOutcome};
pub use config::{ConfigError, ManagerConfig};
pub use executor::{open_position, EntryOutcome, EntrySignal, NoSignals, SignalSource};
pub use monitor::{evaluate_tick, AbortReason, MonitorOutcome, PositionMonitor, TickEvaluation};
pub use reconciler::{reconcile, ReconcileOutcome};
pub use risk::{RegimeTable, RiskParameters};
pub use service::{CycleOutcome, Supervisor};
pub use session::Session;
pub use state_store::{StateError, StateStore};
pub use types::{CloseReason, MonitorPhase, Position, ProfitTargets, Regime};
