//! Market clock: decides whether the options session is open.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

/// Source of truth for "is the market open right now".
pub trait MarketClock: Send + Sync {
    fn is_open(&self) -> bool;
}

/// US equity regular trading hours, evaluated in US/Eastern.
///
/// Open from 09:30 through 16:00 inclusive, Monday to Friday. Exchange
/// holidays are not modeled.
#[derive(Debug, Clone, Copy)]
pub struct UsEquityHours {
    open_secs: u32,
    close_secs: u32,
}

impl Default for UsEquityHours {
    fn default() -> Self {
        Self {
            open_secs: 9 * 3600 + 30 * 60,
            close_secs: 16 * 3600,
        }
    }
}

impl UsEquityHours {
    /// Regular session hours.
    #[must_use]
    pub fn regular() -> Self {
        Self::default()
    }

    /// Whether the session is open at the given instant.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&Eastern);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let secs = local.num_seconds_from_midnight();
        self.open_secs <= secs && secs <= self.close_secs
    }
}

impl MarketClock for UsEquityHours {
    fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}

/// Clock toggled by hand. Used by replays and tests.
#[derive(Debug)]
pub struct ManualClock {
    open: AtomicBool,
}

impl ManualClock {
    #[must_use]
    pub fn new(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }
}

impl MarketClock for ManualClock {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
