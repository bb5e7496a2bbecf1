// src/config/mod.rs

//! Configuration loading and validation for habprov.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Check enumerated values, binds, package identifiers and durations, and
//!   build the immutable `ProvisionerConfig` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{from_toml_str, load_and_validate, load_from_path};
pub use model::{
    Bind, ConnectionSection, ConnectionSettings, ProvisionerConfig, RawProvisionerConfig,
    RawServiceConfig, ServiceSpec, SupervisorSettings,
};
pub use validate::{parse_bind, parse_duration, validate_config};
