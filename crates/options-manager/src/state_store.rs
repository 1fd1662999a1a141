//! Durable storage for the single active position.
//!
//! The record is a pretty-printed JSON document so an operator can inspect it
//! by hand. A flat account is stored as `{"is_open": false}`.
//!
//! Writes go to a sibling temp file which is fsynced and renamed over the
//! real file, so a reader only ever sees the previous or the new complete
//! record. A missing, unreadable, or malformed record loads as "no open
//! position".
//!
//! Exactly one process may own a given state file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::Position;

/// Errors from state persistence operations.
#[derive(Error, Debug)]
pub enum StateError {
    /// IO error reading/writing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record parsed but violates a position invariant.
    #[error("invalid position record: {0}")]
    Invariant(String),
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    is_open: bool,

    #[serde(flatten)]
    position: Option<Position>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// Handles persisting and loading the active position.
#[derive(Debug, Clone)]
pub struct StateStore {
    /// Path to the state file.
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Writes the full position record, replacing any prior content.
    pub fn persist(&self, position: &Position) -> Result<(), StateError> {
        position.check_invariants().map_err(StateError::Invariant)?;

        self.write_atomic(&StateRecord {
            is_open: true,
            position: Some(position.clone()),
            saved_at: Some(Utc::now()),
        })?;

        debug!(
            path = %self.path.display(),
            contract = %position.contract_identity.display_name(),
            highest = %position.highest_price,
            trailing_pct = %position.trailing_percent,
            breakeven = position.breakeven_activated,
            profit_lock = position.profit_lock_activated,
            "Saved position state"
        );
        Ok(())
    }

    /// Loads the open position, if any.
    ///
    /// Never fails: unreadable or malformed records are logged and treated
    /// as flat.
    pub fn load(&self) -> Option<Position> {
        match self.load_checked() {
            Ok(position) => position,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to load position state, treating as flat"
                );
                None
            }
        }
    }

    /// Loads the open position, surfacing corruption as an error.
    ///
    /// A missing file or a flat record is `Ok(None)`.
    pub fn load_checked(&self) -> Result<Option<Position>, StateError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No position state file found");
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let record: StateRecord = serde_json::from_reader(BufReader::new(file))?;

        if !record.is_open {
            return Ok(None);
        }

        let position = record.position.ok_or_else(|| {
            StateError::Invariant("record marked open but position fields are missing".to_string())
        })?;
        position.check_invariants().map_err(StateError::Invariant)?;
        Ok(Some(position))
    }

    /// Marks the store flat. Calling it on an already-flat store is a no-op.
    pub fn clear(&self) -> Result<(), StateError> {
        self.write_atomic(&StateRecord {
            is_open: false,
            position: None,
            saved_at: None,
        })?;
        info!(path = %self.path.display(), "Position state cleared");
        Ok(())
    }

    fn write_atomic(&self, record: &StateRecord) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        {
            let file = File::create(&temp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.write_all(b"\n")?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Regime;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sentinel_broker::{ContractIdentity, OptionRight};
    use tempfile::TempDir;

    /// Creates a temp directory and returns a store inside it.
    fn temp_store() -> (TempDir, StateStore) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("trade_state.json"));
        (dir, store)
    }

    fn make_position() -> Position {
        let contract = ContractIdentity::new(
            "SPY",
            NaiveDate::from_ymd_opt(2026, 6, 19).unwrap(),
            dec!(500),
            OptionRight::Call,
        )
        .with_con_id(123456);
        let mut pos = Position::opened(contract, dec!(2.00), 4, dec!(10), Regime::Reversion);
        pos.highest_price = dec!(2.45);
        pos.breakeven_activated = true;
        pos
    }

    // =========================================================================
    // Round trip
    // =========================================================================

    #[test]
    fn persist_then_load_round_trips() {
        let (_dir, store) = temp_store();
        let pos = make_position();

        store.persist(&pos).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, pos);
    }

    #[test]
    fn persist_replaces_prior_record() {
        let (_dir, store) = temp_store();
        let mut pos = make_position();
        store.persist(&pos).unwrap();

        pos.highest_price = dec!(2.90);
        pos.profit_lock_activated = true;
        pos.trailing_percent = dec!(5);
        store.persist(&pos).unwrap();

        assert_eq!(store.load().unwrap(), pos);
    }

    #[test]
    fn record_is_human_readable() {
        let (_dir, store) = temp_store();
        store.persist(&make_position()).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["is_open"], true);
        assert_eq!(json["regime"], "REVERSION");
        assert_eq!(json["entry_price"], "2.00");
        assert_eq!(json["contract_identity"]["symbol"], "SPY");
        assert!(raw.contains('\n'));
    }

    // =========================================================================
    // Flat / missing / corrupt
    // =========================================================================

    #[test]
    fn missing_file_is_flat() {
        let (_dir, store) = temp_store();
        assert!(store.load().is_none());
        assert!(store.load_checked().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_flat() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "{\"is_open\": true, \"entry_pr").unwrap();

        assert!(store.load().is_none());
        assert!(matches!(store.load_checked(), Err(StateError::Json(_))));
    }

    #[test]
    fn open_record_missing_fields_is_flat() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "{\"is_open\": true, \"quantity\": 2}").unwrap();

        assert!(store.load().is_none());
        assert!(matches!(store.load_checked(), Err(StateError::Invariant(_))));
    }

    #[test]
    fn record_without_flags_or_regime_loads_unarmed_trend() {
        let (_dir, store) = temp_store();
        store.persist(&make_position()).unwrap();
        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let fields = json.as_object_mut().unwrap();
        fields.remove("breakeven_activated");
        fields.remove("profit_lock_activated");
        fields.remove("regime");
        fs::write(store.path(), json.to_string()).unwrap();

        let loaded = store.load_checked().unwrap().unwrap();

        assert_eq!(loaded.regime, Regime::Trend);
        assert!(!loaded.breakeven_activated);
        assert!(!loaded.profit_lock_activated);
        assert_eq!(loaded.highest_price, dec!(2.45));
    }

    #[test]
    fn loaded_record_with_broken_flags_is_flat() {
        let (_dir, store) = temp_store();
        store.persist(&make_position()).unwrap();
        let raw = fs::read_to_string(store.path())
            .unwrap()
            .replace("\"breakeven_activated\": true", "\"breakeven_activated\": false")
            .replace("\"profit_lock_activated\": false", "\"profit_lock_activated\": true");
        fs::write(store.path(), raw).unwrap();

        assert!(matches!(store.load_checked(), Err(StateError::Invariant(_))));
    }

    #[test]
    fn persist_refuses_profit_lock_without_breakeven() {
        let (_dir, store) = temp_store();
        let mut pos = make_position();
        pos.breakeven_activated = false;
        pos.profit_lock_activated = true;

        assert!(matches!(store.persist(&pos), Err(StateError::Invariant(_))));
        assert!(!store.path().exists());
    }

    // =========================================================================
    // Clear
    // =========================================================================

    #[test]
    fn clear_is_idempotent() {
        let (_dir, store) = temp_store();
        store.persist(&make_position()).unwrap();

        store.clear().unwrap();
        let once = fs::read_to_string(store.path()).unwrap();
        store.clear().unwrap();
        let twice = fs::read_to_string(store.path()).unwrap();

        assert_eq!(once, twice);
        assert!(store.load().is_none());
        let json: serde_json::Value = serde_json::from_str(&twice).unwrap();
        assert_eq!(json, serde_json::json!({ "is_open": false }));
    }

    #[test]
    fn clear_on_missing_file_succeeds() {
        let (_dir, store) = temp_store();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    // =========================================================================
    // Atomic replace
    // =========================================================================

    #[test]
    fn no_temp_file_left_behind() {
        let (_dir, store) = temp_store();
        store.persist(&make_position()).unwrap();
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn torn_temp_file_does_not_affect_committed_state() {
        let (_dir, store) = temp_store();
        let pos = make_position();
        store.persist(&pos).unwrap();

        // Simulates a crash mid-write: half a document in the temp file.
        fs::write(store.temp_path(), "{\"is_open\": true, \"entry_price\": \"9").unwrap();

        assert_eq!(store.load().unwrap(), pos);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested/state/trade_state.json"));
        store.persist(&make_position()).unwrap();
        assert!(store.load().is_some());
    }
}
