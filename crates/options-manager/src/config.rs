//! Typed, validated manager configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentinel_core::ConfigLoader;

use crate::risk::RegimeTable;

/// Configuration rejected by validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Where the active position record lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Seconds between price polls.
    pub poll_interval_secs: u64,
    /// Cost buffer (%) added on top of entry once breakeven is armed.
    pub breakeven_buffer_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloserConfig {
    /// How long to wait for a close order to fill.
    pub fill_timeout_secs: u64,
    pub fill_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Seconds between supervision cycles.
    pub cycle_interval_secs: u64,
}

/// Instruments the strategy trades. Broker holdings in this universe without
/// a persisted record are treated as ghost positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniverseConfig {
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    /// Minimum option volume for the liquidity check.
    pub min_volume: u64,
    /// Volatility index level above which new entries use the reversion regime.
    pub reversion_vix_threshold: Decimal,
}

/// Manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    pub state: StateConfig,
    pub monitor: MonitorConfig,
    pub closer: CloserConfig,
    pub supervisor: SupervisorConfig,
    pub universe: UniverseConfig,
    pub entry: EntryConfig,
    pub regimes: RegimeTable,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            state: StateConfig {
                path: PathBuf::from("trade_state.json"),
            },
            monitor: MonitorConfig {
                poll_interval_secs: 20,
                breakeven_buffer_pct: dec!(0.5),
            },
            closer: CloserConfig {
                fill_timeout_secs: 60,
                fill_poll_interval_ms: 1000,
            },
            supervisor: SupervisorConfig {
                cycle_interval_secs: 300,
            },
            universe: UniverseConfig {
                symbol: "SPY".to_string(),
            },
            entry: EntryConfig {
                min_volume: 100,
                reversion_vix_threshold: dec!(25),
            },
            regimes: RegimeTable::default(),
        }
    }
}

impl ManagerConfig {
    /// Loads from a TOML/JSON file with `SENTINEL_` env overrides, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing file, missing or unknown keys, or
    /// values that fail [`ManagerConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = ConfigLoader::load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("state.path", "must not be empty"));
        }
        if self.monitor.breakeven_buffer_pct < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "monitor.breakeven_buffer_pct",
                "must not be negative",
            ));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.poll_interval_secs", "must be positive"));
        }
        if self.closer.fill_timeout_secs == 0 {
            return Err(ConfigError::invalid("closer.fill_timeout_secs", "must be positive"));
        }
        if self.closer.fill_poll_interval_ms == 0 {
            return Err(ConfigError::invalid("closer.fill_poll_interval_ms", "must be positive"));
        }
        if self.supervisor.cycle_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "supervisor.cycle_interval_secs",
                "must be positive",
            ));
        }
        if self.universe.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("universe.symbol", "must not be empty"));
        }
        self.regimes.validate()
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs)
    }

    #[must_use]
    pub fn fill_timeout(&self) -> Duration {
        Duration::from_secs(self.closer.fill_timeout_secs)
    }

    #[must_use]
    pub fn fill_poll_interval(&self) -> Duration {
        Duration::from_millis(self.closer.fill_poll_interval_ms)
    }

    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.supervisor.cycle_interval_secs)
    }
}
