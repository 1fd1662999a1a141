pub mod clock;
pub mod config_loader;
pub mod notify;

pub use clock::{ManualClock, MarketClock, UsEquityHours};
pub use config_loader::ConfigLoader;
pub use notify::{alert, LogNotifier, MemoryNotifier, Notifier, SentAlert, Severity};
