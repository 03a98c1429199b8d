use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::responder::ResponseAssembler;

/// Receive buffer size; holds the largest datagram UDP can carry.
const MAX_DATAGRAM: usize = 65_535;

pub struct UdpProtocolHandler {
    socket: Arc<UdpSocket>,
    assembler: Arc<ResponseAssembler>,
}

impl UdpProtocolHandler {
    pub fn new(socket: UdpSocket, assembler: Arc<ResponseAssembler>) -> Self {
        Self {
            socket: Arc::new(socket),
            assembler,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives datagrams until a shutdown signal arrives. Each datagram is
    /// answered from its own task; the socket stays open throughout.
    pub async fn run_server(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("UDP DNS server listening on {}", self.local_addr()?);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("UDP server received shutdown signal");
                    break;
                }

                result = self.socket.recv_from(&mut buf) => {
                    // Errors such as ICMP port-unreachable from an earlier
                    // reply are per-datagram; the socket stays usable.
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("UDP receive error: {}", e);
                            continue;
                        }
                    };

                    let datagram = buf[..len].to_vec();
                    let socket = self.socket.clone();
                    let assembler = self.assembler.clone();
                    tokio::spawn(async move {
                        handle_datagram(&socket, &assembler, &datagram, peer).await;
                    });
                }
            }
        }

        Ok(())
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    assembler: &ResponseAssembler,
    datagram: &[u8],
    peer: SocketAddr,
) {
    let Some(response) = assembler.respond(datagram).await else {
        debug!("No response for {} byte datagram from {}", datagram.len(), peer);
        return;
    };

    match socket.send_to(&response, peer).await {
        Ok(sent) => debug!("Sent {} bytes to {}", sent, peer),
        Err(e) => error!("Failed to send UDP response to {}: {}", peer, e),
    }
}
