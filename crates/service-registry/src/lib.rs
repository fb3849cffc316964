//! Register a process with a Consul-compatible service registry, expose the
//! health endpoint the registry polls, and read/write its key/value store.

pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod error;
pub mod health;
pub mod metadata;
pub mod registry;
pub mod service;

pub use bootstrap::{bootstrap_service, init_consul, parse_listen_address, CONSUL_RUL};
pub use codec::{JsonCodec, RawCodec, ValueCodec};
pub use config::DiscoveryOptions;
pub use error::{RegistryError, Result};
pub use registry::ServiceDiscovery;
pub use service::{HealthCheck, ServiceRegistration};

// Re-export the macro
pub use service_registry_macros::register_service;
