//! CLI commands for operating the options risk manager.

pub mod check_config;
pub mod params;
pub mod replay;
pub mod reset;
pub mod status;

pub use check_config::{run_check_config, CheckConfigArgs};
pub use params::{run_params, ParamsArgs};
pub use replay::{run_replay, ReplayArgs};
pub use reset::{run_reset, ResetArgs};
pub use status::{run_status, StatusArgs};

/// Default config location.
pub const DEFAULT_CONFIG: &str = "config/sentinel.toml";
