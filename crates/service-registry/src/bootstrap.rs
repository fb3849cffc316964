use crate::config::DiscoveryOptions;
use crate::error::{RegistryError, Result};
use crate::registry::ServiceDiscovery;
use std::env;
use tracing::info;

/// Environment variable holding the default registry address.
pub const CONSUL_RUL: &str = "CONSUL_RUL";

/// Split a `host:port` listen address.
///
/// Exactly one `:` is accepted and the port must be a non-zero integer.
pub fn parse_listen_address(ip_port: &str) -> Result<(String, u16)> {
    let parts: Vec<&str> = ip_port.split(':').collect();
    if parts.len() != 2 {
        return Err(RegistryError::Config(format!(
            "listen address {:?} must have the form host:port",
            ip_port
        )));
    }

    let host = parts[0];
    if host.is_empty() {
        return Err(RegistryError::Config(format!(
            "listen address {:?} has no host",
            ip_port
        )));
    }

    let port: u16 = parts[1].parse().map_err(|e| {
        RegistryError::Config(format!("invalid port {:?} in {:?}: {}", parts[1], ip_port, e))
    })?;
    if port == 0 {
        return Err(RegistryError::Config(format!(
            "listen address {:?} has port 0",
            ip_port
        )));
    }

    Ok((host.to_string(), port))
}

/// Pick the explicit registry address, else `CONSUL_RUL` from the environment.
pub fn resolve_registry_address(explicit: &str) -> Result<String> {
    resolve_registry_address_from(explicit, env::var(CONSUL_RUL).ok())
}

pub fn resolve_registry_address_from(explicit: &str, fallback: Option<String>) -> Result<String> {
    if !explicit.trim().is_empty() {
        return Ok(explicit.trim().to_string());
    }
    match fallback {
        Some(address) if !address.trim().is_empty() => Ok(address.trim().to_string()),
        _ => Err(RegistryError::Config(format!(
            "no registry address given and {} is not set",
            CONSUL_RUL
        ))),
    }
}

/// Options for `service_name` at `ip_port` with the default health check
/// (`ok` polled every 10s, removed after 10 minutes critical).
pub fn bootstrap_options(
    consul_url: &str,
    service_name: &str,
    ip_port: &str,
) -> Result<DiscoveryOptions> {
    let (host, port) = parse_listen_address(ip_port)?;
    let registry_address = resolve_registry_address(consul_url)?;
    Ok(DiscoveryOptions::new(service_name, host, port).with_registry_address(registry_address))
}

/// Connect to the registry and register `service_name` listening on `ip_port`.
///
/// An empty `consul_url` falls back to `CONSUL_RUL`. Any error here means the
/// process was not registered.
pub async fn init_consul(
    consul_url: &str,
    service_name: &str,
    ip_port: &str,
) -> Result<ServiceDiscovery> {
    let options = bootstrap_options(consul_url, service_name, ip_port)?;
    let discovery = ServiceDiscovery::new(options).await?;
    discovery.register().await?;

    info!(
        "Service {} registered as {}",
        service_name,
        discovery.service_id()
    );
    Ok(discovery)
}

/// [`init_consul`] using the registry address from `CONSUL_RUL`.
pub async fn bootstrap_service(service_name: &str, ip_port: &str) -> Result<ServiceDiscovery> {
    init_consul("", service_name, ip_port).await
}
