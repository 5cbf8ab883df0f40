use crate::config::SharedConfig;
use crate::dns::handlers::Handler;
use crate::error::Error;
use crate::record::SharedSink;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;

/// Large enough for any EDNS0 query a resolver will send us.
const MAX_DATAGRAM: usize = 4096;

/// Bind the DNS UDP socket from `config`.
///
/// # Errors
///
/// Returns [`Error::IO`] if the socket can't be bound.
pub async fn new(config: SharedConfig, sink: SharedSink) -> Result<Server, Error> {
    let socket = UdpSocket::bind(config.dns_udp_bind_addr).await?;
    Ok(Server::from_socket(socket, config, sink))
}

pub struct Server {
    socket: Arc<UdpSocket>,
    handler: Handler,
    datagram_permits: Arc<Semaphore>,
}

impl Server {
    #[must_use]
    pub fn from_socket(socket: UdpSocket, config: SharedConfig, sink: SharedSink) -> Self {
        let datagram_permits = Arc::new(Semaphore::new(config.dns_max_inflight));
        Server {
            socket: Arc::new(socket),
            handler: Handler::new(config, sink),
            datagram_permits,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::IO`] if the socket's address can't be read.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve queries until the task is dropped. Each datagram is handled on its own task.
    pub async fn block_until_done(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    // ICMP errors from earlier sends surface here on some platforms.
                    tracing::warn!("failed to receive DNS datagram: {err}");
                    continue;
                }
            };
            let Ok(permit) = Arc::clone(&self.datagram_permits).try_acquire_owned() else {
                tracing::debug!(%src, "too many DNS queries in flight, dropping datagram");
                continue;
            };

            let datagram = buf[..len].to_vec();
            let handler = self.handler.clone();
            let socket = Arc::clone(&self.socket);
            tokio::spawn(async move {
                if let Some(reply) = handler.handle_datagram(&datagram, src) {
                    if let Err(err) = socket.send_to(&reply, src).await {
                        tracing::warn!(%src, "failed to send DNS response: {err}");
                    }
                }
                drop(permit);
            });
        }
    }
}
