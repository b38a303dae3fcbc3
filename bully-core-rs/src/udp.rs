//! UDP transport for election messages
//!
//! Each rank binds its own socket at `peers[rank]`. Envelopes travel as JSON
//! datagrams. A background task parses incoming datagrams into the mailbox;
//! another drains an outbound queue so that `send` never blocks. Both stop
//! once the last `Transport` clone is dropped, releasing the socket.

use crate::error::{BullyError, Result};
use crate::mailbox::Mailbox;
use crate::transport::{Link, Transport};
use crate::types::{Envelope, Group, Rank};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Maximum datagram size; envelopes are a few dozen bytes
const MAX_MSG_SIZE: usize = 1024;

struct UdpLink {
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl Link for UdpLink {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| BullyError::TransportClosed)
    }
}

/// Bind the socket for `rank` and start the background send/receive tasks.
///
/// Must be called from within a tokio runtime.
pub async fn bind(rank: Rank, peers: Vec<SocketAddr>) -> Result<Transport> {
    let group = Group::new(peers.len())?;
    group.check(rank)?;

    let socket = Arc::new(UdpSocket::bind(peers[rank]).await?);
    debug!("UDP: node {} bound to {}", rank, socket.local_addr()?);

    let mailbox = Arc::new(Mailbox::new());
    let peers = Arc::new(peers);

    let (closed_tx, closed_rx) = oneshot::channel();
    spawn_receive(rank, group, socket.clone(), Arc::downgrade(&mailbox), closed_rx);
    let outbound = spawn_send(socket, peers, closed_tx);

    Ok(Transport::new(
        rank,
        group,
        mailbox,
        Arc::new(UdpLink { outbound }),
    ))
}

/// Runs until the send task ends (every link dropped) or the mailbox is gone
fn spawn_receive(
    rank: Rank,
    group: Group,
    socket: Arc<UdpSocket>,
    mailbox: Weak<Mailbox>,
    mut closed: oneshot::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_MSG_SIZE];

        loop {
            let received = tokio::select! {
                received = socket.recv_from(&mut buf) => received,
                _ = &mut closed => break,
            };

            match received {
                Ok((len, src)) => match Envelope::from_bytes(&buf[..len]) {
                    Ok(env) if env.to != rank => {
                        warn!("UDP: dropping {} addressed to {} (we are {})", env.tag, env.to, rank);
                    }
                    Ok(env) if !group.contains(env.from) => {
                        warn!("UDP: dropping {} from unknown rank {} at {}", env.tag, env.from, src);
                    }
                    Ok(env) => {
                        let Some(mailbox) = mailbox.upgrade() else {
                            break;
                        };
                        debug!("UDP: received {} from {} ({})", env.tag, env.from, src);
                        mailbox.deliver(env.from, env.tag);
                    }
                    Err(e) => {
                        warn!("UDP: failed to parse datagram from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    error!("UDP receive error: {}", e);
                }
            }
        }

        debug!("UDP: node {} receive loop stopped", rank);
    });
}

fn spawn_send(
    socket: Arc<UdpSocket>,
    peers: Arc<Vec<SocketAddr>>,
    closed: oneshot::Sender<()>,
) -> mpsc::UnboundedSender<Envelope> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    tokio::spawn(async move {
        // Dropped on exit, which stops the receive loop
        let _closed = closed;

        while let Some(env) = rx.recv().await {
            let bytes = match env.to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("UDP: failed to encode {:?}: {}", env, e);
                    continue;
                }
            };

            let addr = peers[env.to];
            if let Err(e) = socket.send_to(&bytes, addr).await {
                warn!("UDP: failed to send {} to {} ({}): {}", env.tag, env.to, addr, e);
            }
        }
    });

    tx
}
