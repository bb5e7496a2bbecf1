#![allow(dead_code)]

use habprov::config::{
    Bind, ConnectionSection, ProvisionerConfig, RawProvisionerConfig, RawServiceConfig,
};

/// Builder for `RawProvisionerConfig` to simplify test setup.
pub struct ConfigBuilder {
    config: RawProvisionerConfig,
}

impl ConfigBuilder {
    pub fn new(host: &str) -> Self {
        Self {
            config: RawProvisionerConfig {
                connection: ConnectionSection {
                    host: host.to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.version = Some(version.to_string());
        self
    }

    pub fn skip_install(mut self) -> Self {
        self.config.skip_install = true;
        self
    }

    pub fn use_sudo(mut self) -> Self {
        self.config.use_sudo = true;
        self
    }

    pub fn service_type(mut self, service_type: &str) -> Self {
        self.config.service_type = Some(service_type.to_string());
        self
    }

    pub fn permanent_peer(mut self) -> Self {
        self.config.permanent_peer = true;
        self
    }

    pub fn peer(mut self, peer: &str) -> Self {
        self.config.peer = Some(peer.to_string());
        self
    }

    pub fn ring_key(mut self, key: &str) -> Self {
        self.config.ring_key = Some(key.to_string());
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.config.connection.user = Some(user.to_string());
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.connection.timeout = Some(timeout.to_string());
        self
    }

    pub fn retry_interval(mut self, interval: &str) -> Self {
        self.config.connection.retry_interval = Some(interval.to_string());
        self
    }

    pub fn with_service(mut self, service: RawServiceConfig) -> Self {
        self.config.services.push(service);
        self
    }

    /// The unvalidated config, for tests that exercise validation.
    pub fn build_raw(self) -> RawProvisionerConfig {
        self.config
    }

    pub fn build(self) -> ProvisionerConfig {
        ProvisionerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `RawServiceConfig`.
pub struct ServiceBuilder {
    service: RawServiceConfig,
}

impl ServiceBuilder {
    pub fn new(ident: &str) -> Self {
        Self {
            service: RawServiceConfig {
                name: ident.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn strategy(mut self, strategy: &str) -> Self {
        self.service.strategy = Some(strategy.to_string());
        self
    }

    pub fn topology(mut self, topology: &str) -> Self {
        self.service.topology = Some(topology.to_string());
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.service.channel = Some(channel.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.service.group = Some(group.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.service.url = Some(url.to_string());
        self
    }

    pub fn bind(mut self, alias: &str, service: &str, group: &str) -> Self {
        self.service.binds.push(Bind::new(alias, service, group));
        self
    }

    /// Compact `alias:service.group` form.
    pub fn bind_str(mut self, bind: &str) -> Self {
        self.service.bind_strings.push(bind.to_string());
        self
    }

    pub fn user_toml(mut self, contents: &str) -> Self {
        self.service.user_toml = Some(contents.to_string());
        self
    }

    pub fn build(self) -> RawServiceConfig {
        self.service
    }
}
