use service_registry::{health, register_service};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Register using the macro; the registry address comes from CONSUL_RUL
    let discovery = match register_service!("macro-service", "127.0.0.1:9090").await {
        Ok(discovery) => discovery,
        Err(e) => {
            eprintln!("service register err: {}", e);
            std::process::exit(1);
        }
    };

    println!("Service registered as {}", discovery.service_id());

    // Serve the health endpoint the registry polls until Ctrl+C
    println!("\nService running... (Press Ctrl+C to exit)");
    let options = discovery.options();
    if let Err(e) = health::serve(
        &options.health_endpoint,
        options.listen_port,
        health::shutdown_on(tokio::signal::ctrl_c()),
    )
    .await
    {
        eprintln!("health endpoint failed: {}", e);
    }

    if let Err(e) = discovery.deregister().await {
        eprintln!("service deregister err: {}", e);
    }
}
