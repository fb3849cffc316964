use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use crate::config::DiscoveryOptions;

/// Agent service registration body, field names as the Consul API expects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub port: u16,
    pub address: String,
    pub check: HealthCheck,
    pub meta: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    pub interval: String,
    pub deregister_critical_service_after: String,
}

impl ServiceRegistration {
    pub fn new(options: &DiscoveryOptions, meta: BTreeMap<String, String>) -> Self {
        Self {
            id: options.service_id(),
            name: options.server_name.clone(),
            tags: vec![options.server_name.clone()],
            port: options.listen_port,
            address: options.listen_addr.clone(),
            check: HealthCheck::new(options),
            meta,
        }
    }
}

impl HealthCheck {
    pub fn new(options: &DiscoveryOptions) -> Self {
        Self {
            http: health_check_url(
                &options.listen_addr,
                options.listen_port,
                &options.health_endpoint,
            ),
            interval: go_duration(options.health_check_interval),
            deregister_critical_service_after: go_duration(options.deregister_after),
        }
    }
}

/// Composite identity of a registered instance: `name-addr-port`.
pub fn service_id(server_name: &str, listen_addr: &str, listen_port: u16) -> String {
    format!("{}-{}-{}", server_name, listen_addr, listen_port)
}

pub fn health_check_url(listen_addr: &str, listen_port: u16, endpoint: &str) -> String {
    format!(
        "http://{}:{}/{}",
        listen_addr,
        listen_port,
        endpoint.trim_start_matches('/')
    )
}

/// Formats a duration the way the registry parses them (`10s`, `10m0s`, `1h0m0s`, `1.5s`).
pub fn go_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < 1_000_000_000 {
        let (unit, scale) = if nanos < 1_000 {
            ("ns", 1)
        } else if nanos < 1_000_000 {
            ("µs", 1_000)
        } else {
            ("ms", 1_000_000)
        };
        return format!("{}{}", decimal(nanos, scale), unit);
    }

    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = u128::from(total % 60) * 1_000_000_000 + u128::from(d.subsec_nanos());

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{}h", hours);
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{}m", minutes);
    }
    let _ = write!(out, "{}s", decimal(seconds, 1_000_000_000));
    out
}

fn decimal(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let rem = value % scale;
    if rem == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let frac = format!("{:0width$}", rem, width = width);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
