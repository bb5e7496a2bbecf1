// src/config/model.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{ServiceType, Topology, UpdateStrategy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// version = "0.79.1"
/// use_sudo = true
/// service_type = "systemd"
/// peer = "10.0.0.10"
///
/// [connection]
/// host = "10.0.0.21"
/// user = "ubuntu"
///
/// [[service]]
/// name = "core/redis"
/// topology = "leader"
/// binds = ["backend:api.prod"]
/// ```
///
/// Enumerated values are kept as plain strings here; they are checked and
/// converted by `validate.rs` so that every invalid field can be reported at
/// once.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProvisionerConfig {
    /// Habitat version to install; `None` installs the latest release.
    #[serde(default)]
    pub version: Option<String>,

    /// Skip the `hab` installer (the binary is already on the host).
    #[serde(default, alias = "skip_hab_install")]
    pub skip_install: bool,

    /// Prefix privileged commands with `sudo`.
    #[serde(default)]
    pub use_sudo: bool,

    /// `"unmanaged"` (default) or `"systemd"`.
    #[serde(default)]
    pub service_type: Option<String>,

    /// Start the supervisor as a permanent peer (`-I`).
    #[serde(default)]
    pub permanent_peer: bool,

    #[serde(default)]
    pub listen_gossip: Option<String>,

    #[serde(default)]
    pub listen_http: Option<String>,

    /// Address of an existing supervisor ring member to join.
    #[serde(default)]
    pub peer: Option<String>,

    /// Name of the ring key used to encrypt gossip traffic.
    #[serde(default)]
    pub ring_key: Option<String>,

    #[serde(default)]
    pub connection: ConnectionSection,

    /// All services from `[[service]]`, in declaration order.
    #[serde(default, rename = "service")]
    pub services: Vec<RawServiceConfig>,
}

/// `[connection]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConnectionSection {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Private key passed to `ssh -i`.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// How long to keep retrying the initial connection (e.g. `"5m"`).
    #[serde(default)]
    pub timeout: Option<String>,

    /// Pause between connection attempts (e.g. `"3s"`).
    #[serde(default)]
    pub retry_interval: Option<String>,
}

/// `[[service]]` entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServiceConfig {
    /// Package identifier, e.g. `core/redis` or `core/redis/4.0.14`.
    pub name: String,

    #[serde(default)]
    pub strategy: Option<String>,

    #[serde(default)]
    pub topology: Option<String>,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub group: Option<String>,

    /// Custom depot / builder URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Binds declared as tables: `[[service.bind]]`.
    #[serde(default, rename = "bind")]
    pub binds: Vec<Bind>,

    /// Binds declared as compact `alias:service.group` strings.
    #[serde(default, rename = "binds")]
    pub bind_strings: Vec<String>,

    /// Contents of `user.toml` to lay down before the service is loaded.
    #[serde(default)]
    pub user_toml: Option<String>,
}

/// Wiring between a service and a peer service group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Bind {
    pub alias: String,
    pub service: String,
    pub group: String,
}

impl Bind {
    pub fn new(alias: &str, service: &str, group: &str) -> Self {
        Self {
            alias: alias.to_string(),
            service: service.to_string(),
            group: group.to_string(),
        }
    }
}

impl fmt::Display for Bind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.alias, self.service, self.group)
    }
}

/// Validated configuration for one provisioning run.
///
/// Only constructed through `TryFrom<RawProvisionerConfig>` (or
/// `new_unchecked` by code that already validated).
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub version: Option<String>,
    pub skip_install: bool,
    pub use_sudo: bool,
    pub service_type: ServiceType,
    pub supervisor: SupervisorSettings,
    pub connection: ConnectionSettings,
    pub services: Vec<ServiceSpec>,
}

impl ProvisionerConfig {
    pub(crate) fn new_unchecked(
        raw: &RawProvisionerConfig,
        service_type: ServiceType,
        connection: ConnectionSettings,
        services: Vec<ServiceSpec>,
    ) -> Self {
        Self {
            version: raw.version.clone(),
            skip_install: raw.skip_install,
            use_sudo: raw.use_sudo,
            service_type,
            supervisor: SupervisorSettings {
                permanent_peer: raw.permanent_peer,
                listen_gossip: raw.listen_gossip.clone(),
                listen_http: raw.listen_http.clone(),
                peer: raw.peer.clone(),
                ring_key: raw.ring_key.clone(),
            },
            connection,
            services,
        }
    }
}

/// Options passed to `hab sup run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub permanent_peer: bool,
    pub listen_gossip: Option<String>,
    pub listen_http: Option<String>,
    pub peer: Option<String>,
    pub ring_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    pub timeout: Duration,
    pub retry_interval: Duration,
}

/// A validated service declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Full package identifier as given (`origin/name[/version[/release]]`).
    pub ident: String,
    pub strategy: Option<UpdateStrategy>,
    pub topology: Option<Topology>,
    pub channel: Option<String>,
    pub group: Option<String>,
    pub url: Option<String>,
    /// Table binds first, then parsed string binds.
    pub binds: Vec<Bind>,
    pub user_toml: Option<String>,
}

impl ServiceSpec {
    /// The `name` part of the identifier, which is also the directory name
    /// under `/hab/svc`.
    pub fn package_name(&self) -> &str {
        self.ident.split('/').nth(1).unwrap_or(&self.ident)
    }
}
