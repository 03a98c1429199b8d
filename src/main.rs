use clap::Parser;
use nxtdns::config::ServerConfig;
use nxtdns::graceful_shutdown::GracefulShutdown;
use nxtdns::server::DnsServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Authoritative DNS for alias-registry top-level domains
#[derive(Debug, Parser)]
#[command(name = "nxtdns", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address for the UDP and TCP listeners
    #[arg(short, long, value_name = "ADDRESS:PORT")]
    bind: Option<SocketAddr>,

    /// Registry API endpoint
    #[arg(long, value_name = "URL")]
    registry_url: Option<String>,

    /// TTL of synthesized records in seconds
    #[arg(long, value_name = "SECONDS")]
    ttl: Option<u32>,
}

impl Cli {
    /// Command-line values take precedence over file and environment.
    fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(url) = &self.registry_url {
            config.registry.url = url.clone();
        }
        if let Some(ttl) = self.ttl {
            config.ttl = ttl;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::load_sources(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let shutdown = GracefulShutdown::new();
    let server = DnsServer::new(config).bind().await?;
    let running = tokio::spawn(server.run(&shutdown));
    info!("Running");

    if let Err(e) = shutdown.trigger_on_ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        shutdown.trigger();
    }

    match running.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task panicked: {}", e),
    }
    info!("Quitting");
    Ok(())
}
