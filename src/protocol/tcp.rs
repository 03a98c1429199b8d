use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{DnsError, Result};
use crate::responder::ResponseAssembler;

/// Length prefix of a DNS message over TCP (RFC 1035 4.2.2)
pub const LENGTH_PREFIX_LEN: usize = 2;

/// How a TCP session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// One response was written
    Responded,
    /// The message could not be answered at all
    Dropped,
    /// No complete message before the idle timer fired
    IdleTimeout,
    /// The peer closed before sending a complete message
    PeerClosed,
}

/// Returns the framed message once the buffer holds the whole declared
/// length. Bytes past the declared length are ignored.
pub fn complete_frame(buf: &[u8]) -> Option<&[u8]> {
    if buf.len() < LENGTH_PREFIX_LEN {
        return None;
    }
    let declared = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    let body = &buf[LENGTH_PREFIX_LEN..];
    if body.len() >= declared {
        Some(&body[..declared])
    } else {
        None
    }
}

/// Prefixes `message` with its 2-byte big-endian length.
pub fn frame_message(message: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(message.len())
        .map_err(|_| DnsError::Io(format!("{} byte response exceeds TCP framing", message.len())))?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + message.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(message);
    Ok(framed)
}

/// One TCP connection: accumulate until a full message is buffered, answer
/// it once and close. Every read re-arms the idle timer.
pub struct TcpSession<S> {
    stream: S,
    peer: SocketAddr,
    buffer: BytesMut,
    idle_timeout: Duration,
    assembler: Arc<ResponseAssembler>,
}

impl<S> TcpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        idle_timeout: Duration,
        assembler: Arc<ResponseAssembler>,
    ) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(512),
            idle_timeout,
            assembler,
        }
    }

    pub async fn run(mut self) -> Result<SessionEnd> {
        loop {
            if let Some(message) = complete_frame(&self.buffer) {
                let message = message.to_vec();
                return self.answer(&message).await;
            }

            match timeout(self.idle_timeout, self.stream.read_buf(&mut self.buffer)).await {
                Err(_) => {
                    debug!(
                        "TCP session from {} idle for {:?}, closing",
                        self.peer, self.idle_timeout
                    );
                    return Ok(SessionEnd::IdleTimeout);
                }
                Ok(Ok(0)) => {
                    debug!("TCP connection closed by client {}", self.peer);
                    return Ok(SessionEnd::PeerClosed);
                }
                Ok(Ok(read)) => {
                    debug!("Read {} bytes from {}, {} buffered", read, self.peer, self.buffer.len());
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn answer(mut self, message: &[u8]) -> Result<SessionEnd> {
        let Some(response) = self.assembler.respond(message).await else {
            let _ = self.stream.shutdown().await;
            return Ok(SessionEnd::Dropped);
        };

        let framed = frame_message(&response)?;
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        // The peer may already be gone; the response is written either way.
        let _ = self.stream.shutdown().await;
        Ok(SessionEnd::Responded)
    }
}

pub struct TcpProtocolHandler {
    listener: TcpListener,
    idle_timeout: Duration,
    assembler: Arc<ResponseAssembler>,
}

impl TcpProtocolHandler {
    pub fn new(
        listener: TcpListener,
        idle_timeout: Duration,
        assembler: Arc<ResponseAssembler>,
    ) -> Self {
        Self {
            listener,
            idle_timeout,
            assembler,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until a shutdown signal arrives. Sessions still
    /// running at that point are not waited for.
    pub async fn run_server(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("TCP DNS server listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("TCP server received shutdown signal");
                    break;
                }

                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("TCP accept error: {}", e);
                            return Err(DnsError::from(e));
                        }
                    };

                    let session = TcpSession::new(stream, peer, self.idle_timeout, self.assembler.clone());
                    tokio::spawn(async move {
                        match session.run().await {
                            Ok(end) => debug!("TCP session from {} ended: {:?}", peer, end),
                            Err(e) => warn!("TCP connection error from {}: {}", peer, e),
                        }
                    });
                }
            }
        }

        Ok(())
    }
}
