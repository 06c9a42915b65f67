//! API gateway binary.
//!
//! Startup order: CLI → configuration → logging → metrics → listener → serve.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, validate_config};
use api_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use api_gateway::observability::{init_logging, init_metrics};
use api_gateway::routing::catalog::DOMAINS;
use api_gateway::routing::router::{RoutePolicy, RouteTable};
use api_gateway::GatewayServer;

#[derive(Parser, Debug)]
#[command(name = "api-gateway", version, about = "HTTP to RPC edge gateway")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen port (overrides config and PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate configuration, print the route table and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(port) = cli.port {
        config.set_port(port);
        if let Err(errors) = validate_config(&config) {
            for error in errors {
                eprintln!("configuration error: {}", error);
            }
            return ExitCode::from(2);
        }
    }

    if cli.check_config {
        let table = RouteTable::from_catalog(DOMAINS, &RoutePolicy::from_config(&config));
        println!("configuration OK, {} routes", table.len());
        print!("{}", table);
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: api_gateway::GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if config.identity.uses_placeholders() {
        tracing::warn!("Identity provider not configured, using development placeholders");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        identity = %config.identity.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
    for (domain, service) in &config.services {
        tracing::info!(domain = %domain, address = %service.address, "Backend service");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.listener();
    spawn_signal_handler(shutdown);

    let server = GatewayServer::new(config)?;
    server.run(listener, stop).await?;
    Ok(())
}
