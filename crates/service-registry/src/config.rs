use crate::error::{RegistryError, Result};
use crate::service;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DEREGISTER_AFTER: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_HEALTH_ENDPOINT: &str = "ok";

/// Connection and registration parameters for a [`crate::ServiceDiscovery`].
///
/// Nothing here reads the environment; the registry address must be supplied
/// by the caller (see [`crate::bootstrap`] for the `CONSUL_RUL` fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    pub server_name: String,
    pub listen_addr: String,
    pub listen_port: u16,
    pub health_check_interval: Duration,
    pub deregister_after: Duration,
    pub health_endpoint: String,
    pub registry_address: String,
    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
    /// Datacenter used for key/value requests.
    pub datacenter: Option<String>,
}

impl DiscoveryOptions {
    pub fn new(
        server_name: impl Into<String>,
        listen_addr: impl Into<String>,
        listen_port: u16,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            listen_addr: listen_addr.into(),
            listen_port,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            deregister_after: DEFAULT_DEREGISTER_AFTER,
            health_endpoint: DEFAULT_HEALTH_ENDPOINT.to_string(),
            registry_address: String::new(),
            token: None,
            datacenter: None,
        }
    }

    /// Options carrying only a registry address, for key/value access through
    /// [`crate::ServiceDiscovery::connect_store`].
    pub fn store_only(registry_address: impl Into<String>) -> Self {
        Self::new("", "", 0).with_registry_address(registry_address)
    }

    pub fn with_registry_address(mut self, address: impl Into<String>) -> Self {
        self.registry_address = address.into();
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_deregister_after(mut self, after: Duration) -> Self {
        self.deregister_after = after;
        self
    }

    pub fn with_health_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.health_endpoint = endpoint.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Registration ID and deregistration key of this instance.
    pub fn service_id(&self) -> String {
        service::service_id(&self.server_name, &self.listen_addr, self.listen_port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_name.trim().is_empty() {
            return Err(RegistryError::Config("server name must not be empty".into()));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(RegistryError::Config("listen address must not be empty".into()));
        }
        if self.listen_port == 0 {
            return Err(RegistryError::Config("listen port must not be zero".into()));
        }
        Ok(())
    }

    /// Parses the registry address into a base URL.
    ///
    /// Bare `host:port` addresses are accepted and treated as plain http.
    pub fn registry_url(&self) -> Result<Url> {
        let address = self.registry_address.trim();
        if address.is_empty() {
            return Err(RegistryError::Config("registry address is required".into()));
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let url = Url::parse(&candidate).map_err(|e| {
            RegistryError::Config(format!("invalid registry address {}: {}", address, e))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RegistryError::Config(format!(
                    "unsupported registry scheme {} in {}",
                    other, address
                )))
            }
        }
        if url.host_str().is_none() {
            return Err(RegistryError::Config(format!(
                "registry address {} has no host",
                address
            )));
        }

        Ok(url)
    }
}
