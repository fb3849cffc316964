use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use service_registry::bootstrap::{parse_listen_address, resolve_registry_address};
use service_registry::{health, DiscoveryOptions, ServiceDiscovery};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consul-register")]
#[command(about = "Register this process with Consul and manage its key/value entries", long_about = None)]
struct Cli {
    /// Registry address, falls back to the CONSUL_RUL environment variable
    #[arg(long, global = true, default_value = "")]
    consul_url: String,
    /// ACL token sent with every request
    #[arg(long, global = true, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Datacenter for key/value requests
    #[arg(long, global = true)]
    datacenter: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a service instance and exit
    Register(ServiceArgs),
    /// Remove a previously registered service instance
    Deregister(ServiceArgs),
    /// Register, serve the health endpoint until Ctrl-C, then deregister
    Serve(ServiceArgs),
    /// Key/value store commands
    Kv {
        #[command(subcommand)]
        command: KvCommands,
    },
}

#[derive(Args)]
struct ServiceArgs {
    /// Service name
    #[arg(short, long)]
    name: String,
    /// Advertised listen address as host:port
    #[arg(short, long)]
    addr: String,
    /// Health check interval in seconds
    #[arg(long, default_value_t = 10)]
    interval: u64,
    /// Minutes a critical check may last before the instance is removed
    #[arg(long, default_value_t = 10)]
    deregister_after: u64,
    /// Health endpoint path polled by the registry
    #[arg(long, default_value = "ok")]
    endpoint: String,
}

#[derive(Subcommand)]
enum KvCommands {
    /// Print the value stored under a key
    Get {
        key: String,
        /// Decode the value as JSON and pretty-print it
        #[arg(long)]
        json: bool,
    },
    /// Store a value under a key
    Put {
        key: String,
        /// Value to store verbatim
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        value: Option<String>,
        /// Read the value from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let registry_address = resolve_registry_address(&cli.consul_url)?;

    match cli.command {
        Commands::Register(args) => {
            let discovery = connect(&cli.token, &cli.datacenter, &registry_address, &args).await?;
            discovery
                .register()
                .await
                .context("service registration failed")?;
        }
        Commands::Deregister(args) => {
            let discovery = connect(&cli.token, &cli.datacenter, &registry_address, &args).await?;
            discovery
                .deregister()
                .await
                .context("service deregistration failed")?;
        }
        Commands::Serve(args) => {
            let discovery = connect(&cli.token, &cli.datacenter, &registry_address, &args).await?;
            health::serve_registered(&discovery, health::shutdown_on(tokio::signal::ctrl_c()))
                .await
                .context("serving registered instance failed")?;
        }
        Commands::Kv { command } => {
            let options = DiscoveryOptions::store_only(&registry_address);
            let discovery =
                ServiceDiscovery::connect_store(with_access(options, &cli.token, &cli.datacenter))
                    .await
                    .context("failed to connect to registry")?;

            match command {
                KvCommands::Get { key, json } => {
                    let mut stdout = std::io::stdout();
                    if json {
                        let value: serde_json::Value = discovery.get_value(&key).await?;
                        writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
                    } else {
                        let bytes = discovery.get_raw(&key).await?;
                        stdout.write_all(&bytes)?;
                    }
                }
                KvCommands::Put { key, value, file } => {
                    let bytes = match (value, file) {
                        (Some(value), _) => value.into_bytes(),
                        (None, Some(path)) => std::fs::read(&path)
                            .with_context(|| format!("failed to read {}", path.display()))?,
                        (None, None) => anyhow::bail!("a value or --file is required"),
                    };
                    discovery.put_value(&key, &bytes).await?;
                    tracing::info!("Stored {} bytes at {}", bytes.len(), key);
                }
            }
        }
    }

    Ok(())
}

async fn connect(
    token: &Option<String>,
    datacenter: &Option<String>,
    registry_address: &str,
    args: &ServiceArgs,
) -> Result<ServiceDiscovery> {
    let (host, port) = parse_listen_address(&args.addr)?;
    let options = DiscoveryOptions::new(&args.name, host, port)
        .with_registry_address(registry_address)
        .with_health_check_interval(Duration::from_secs(args.interval))
        .with_deregister_after(Duration::from_secs(args.deregister_after * 60))
        .with_health_endpoint(&args.endpoint);

    ServiceDiscovery::new(with_access(options, token, datacenter))
        .await
        .context("failed to connect to registry")
}

fn with_access(
    mut options: DiscoveryOptions,
    token: &Option<String>,
    datacenter: &Option<String>,
) -> DiscoveryOptions {
    options.token = token.clone();
    options.datacenter = datacenter.clone();
    options
}
