use serde::{Deserialize, Serialize};
use service_registry::{DiscoveryOptions, JsonCodec, ServiceDiscovery};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct WorkerConfig {
    workers: u32,
    region: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Connect to a local Consul agent (make sure one is running on localhost:8500)
    let options = DiscoveryOptions::new("example-service", "127.0.0.1", 8080)
        .with_registry_address("http://localhost:8500")
        .with_health_check_interval(Duration::from_secs(5))
        .with_health_endpoint("health");

    let discovery = ServiceDiscovery::new(options).await?;

    println!("Registering service {}", discovery.service_id());
    discovery.register().await?;

    // Store and read back a structured value
    let config = WorkerConfig {
        workers: 4,
        region: "eu-west".to_string(),
    };
    discovery
        .put_as::<JsonCodec<WorkerConfig>>("example-service/config", &config)
        .await?;
    let stored: WorkerConfig = discovery.get_value("example-service/config").await?;
    println!("Stored config: {:?}", stored);

    // Raw bytes are stored verbatim
    discovery.put_value("example-service/banner", b"hello").await?;
    let banner = discovery.get_raw("example-service/banner").await?;
    println!("Banner: {}", String::from_utf8_lossy(&banner));

    println!("\nDeregistering service...");
    discovery.deregister().await?;
    println!("Service deregistered successfully");

    Ok(())
}
