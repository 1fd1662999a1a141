use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SENTINEL_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads a typed configuration from a TOML or JSON file, then applies
    /// `SENTINEL_`-prefixed environment overrides (`__` separates nesting).
    ///
    /// The file is required. Missing keys and unknown keys surface as
    /// extraction errors when the target type denies them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed into `T`.
    pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as [`ConfigLoader::load`] with a caller-chosen env prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed into `T`.
    pub fn load_with_prefix<T: DeserializeOwned>(path: impl AsRef<Path>, prefix: &str) -> Result<T> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }

        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Figment::new().merge(Json::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        };

        let config: T = figment
            .merge(Env::prefixed(prefix).split("__"))
            .extract()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;

        Ok(config)
    }
}
