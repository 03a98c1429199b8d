use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;

use crate::config::ServerConfig;
use crate::dns::{MessageCodec, WireCodec};
use crate::error::Result;
use crate::graceful_shutdown::GracefulShutdown;
use crate::protocol::{TcpProtocolHandler, UdpProtocolHandler};
use crate::registry::{AliasLookup, AliasResolver};
use crate::resolver::QueryResolver;
use crate::responder::ResponseAssembler;

/// Wires configuration, registry client and response assembly together.
pub struct DnsServer {
    config: Arc<ServerConfig>,
    assembler: Arc<ResponseAssembler>,
}

impl DnsServer {
    /// Server backed by the HTTP registry named in `config`.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(AliasResolver::new(&config.registry));
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: ServerConfig, registry: Arc<dyn AliasLookup>) -> Self {
        let config = Arc::new(config);
        let codec: Arc<dyn MessageCodec> = Arc::new(WireCodec);
        let resolver = QueryResolver::new(config.clone(), registry);
        let assembler = Arc::new(ResponseAssembler::new(resolver, codec));
        Self { config, assembler }
    }

    pub fn assembler(&self) -> Arc<ResponseAssembler> {
        self.assembler.clone()
    }

    /// Binds the UDP socket and TCP listener on the configured address.
    pub async fn bind(self) -> Result<BoundServer> {
        let udp_socket = UdpSocket::bind(self.config.bind_addr).await?;
        let tcp_listener = TcpListener::bind(self.config.bind_addr).await?;

        info!(
            "Serving {} TLD(s) [{}] from registry {} (ttl={}s, up to {} registry calls per question)",
            self.config.tlds.len(),
            self.config.tlds.tlds().collect::<Vec<_>>().join(", "),
            self.config.registry.url,
            self.config.ttl,
            self.config.registry.call_budget()
        );

        Ok(BoundServer {
            udp: UdpProtocolHandler::new(udp_socket, self.assembler.clone()),
            tcp: TcpProtocolHandler::new(
                tcp_listener,
                self.config.tcp_idle_timeout,
                self.assembler.clone(),
            ),
        })
    }
}

pub struct BoundServer {
    udp: UdpProtocolHandler,
    tcp: TcpProtocolHandler,
}

impl BoundServer {
    pub fn udp_addr(&self) -> Result<SocketAddr> {
        self.udp.local_addr()
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr> {
        self.tcp.local_addr()
    }

    /// Runs both listeners until `shutdown` fires or one of them fails.
    ///
    /// The listeners subscribe before this returns, so a signal sent any
    /// time after the call is seen.
    pub fn run(
        self,
        shutdown: &GracefulShutdown,
    ) -> impl Future<Output = Result<()>> + Send + use<> {
        let udp_shutdown = shutdown.subscribe();
        let tcp_shutdown = shutdown.subscribe();
        async move {
            futures::try_join!(
                self.udp.run_server(udp_shutdown),
                self.tcp.run_server(tcp_shutdown),
            )?;
            info!("DNS server stopped");
            Ok(())
        }
    }
}
