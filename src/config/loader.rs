// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ProvisionerConfig, RawProvisionerConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawProvisionerConfig`.
///
/// This only performs TOML deserialization; it does **not** check enumerated
/// values, bind strings or durations. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProvisionerConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    from_toml_str(&contents)
}

/// Deserialize a raw config from TOML text.
pub fn from_toml_str(contents: &str) -> Result<RawProvisionerConfig> {
    let config: RawProvisionerConfig = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// `host_override` replaces `[connection].host` before validation, so a
/// config without a host is accepted when the host comes from the CLI.
pub fn load_and_validate(
    path: impl AsRef<Path>,
    host_override: Option<&str>,
) -> Result<ProvisionerConfig> {
    let mut raw = load_from_path(&path)?;
    if let Some(host) = host_override {
        raw.connection.host = host.to_string();
    }
    let config = ProvisionerConfig::try_from(raw)?;
    Ok(config)
}
