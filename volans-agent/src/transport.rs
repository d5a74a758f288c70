//! UDP broadcast transport: Broadcaster sends datagrams, Listener decodes
//! received packets into the dispatch queue.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::warn;

use volans_core::protocol::Datagram;
use volans_core::wire::{decode_datagram, encode_datagram, DatagramEncodeError, MAX_DATAGRAM_LEN};

use crate::config::Config;

const RECV_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("bad address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Encode(#[from] DatagramEncodeError),
}

/// Sends encoded datagrams to the broadcast address. Best-effort: no retry,
/// no delivery confirmation.
pub struct Broadcaster {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl Broadcaster {
    /// Create the send socket. Any socket error fails construction.
    pub async fn bind(config: &Config) -> Result<Broadcaster, TransportError> {
        let dest_ip: IpAddr = config.broadcast_addr.parse()?;
        let dest = SocketAddr::new(dest_ip, config.broadcast_port());
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(TransportError::Bind)?;
        socket.set_broadcast(true).map_err(TransportError::Bind)?;
        Ok(Broadcaster { socket, dest })
    }

    /// Encode and transmit one datagram as one UDP packet.
    pub async fn send(&self, dgram: &Datagram) -> Result<(), TransportError> {
        let bytes = encode_datagram(dgram)?;
        self.socket
            .send_to(&bytes, self.dest)
            .await
            .map_err(TransportError::Send)?;
        Ok(())
    }
}

/// Receives packets on the shared port and queues decoded datagrams for the
/// dispatcher. The queue is unbounded; `pending` mirrors its depth.
pub struct Listener {
    socket: UdpSocket,
    queue: mpsc::UnboundedSender<Datagram>,
    pending: Arc<AtomicUsize>,
}

impl Listener {
    /// Bind the shared receive port. Any socket error fails construction.
    pub async fn bind(
        config: &Config,
        queue: mpsc::UnboundedSender<Datagram>,
        pending: Arc<AtomicUsize>,
    ) -> Result<Listener, TransportError> {
        let bind_ip: IpAddr = config.bind_addr.parse()?;
        let socket = UdpSocket::bind((bind_ip, config.port))
            .await
            .map_err(TransportError::Bind)?;
        Ok(Listener {
            socket,
            queue,
            pending,
        })
    }

    /// Receive until the shutdown signal flips. Undecodable packets are
    /// logged and skipped; socket errors back off briefly and retry.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((n, from)) => match decode_datagram(&buf[..n]) {
                        Ok(dgram) => {
                            self.pending.fetch_add(1, Ordering::Relaxed);
                            if self.queue.send(dgram).is_err() {
                                // dispatcher gone, nothing left to feed
                                self.pending.fetch_sub(1, Ordering::Relaxed);
                                break;
                            }
                        }
                        Err(e) => warn!(%from, error = %e, "discarding undecodable datagram"),
                    },
                    Err(e) => {
                        warn!(error = %e, "receive failed, backing off");
                        tokio::time::sleep(RECV_RETRY_DELAY).await;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
    }
}
