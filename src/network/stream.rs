//! State stream receiver
//!
//! Owns the UDP socket and continuously decodes inbound state snapshots,
//! delivering each to a sink until cancellation is signaled. Datagrams of
//! the wrong size are logged and discarded; UDP gives no ordering or
//! delivery guarantee, so each decoded snapshot simply supersedes the
//! previous one at the sink.

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::protocol::{decode_state_snapshot, StateSnapshot, SNAPSHOT_LEN};

/// Receiver errors
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Consumer of decoded state snapshots.
///
/// This is the seam to the rendering collaborator: called synchronously
/// from the receiver's task, once per valid datagram.
pub trait SnapshotSink: Send {
    fn on_snapshot(&mut self, snapshot: StateSnapshot);
}

impl<F> SnapshotSink for F
where
    F: FnMut(StateSnapshot) + Send,
{
    fn on_snapshot(&mut self, snapshot: StateSnapshot) {
        self(snapshot)
    }
}

/// Receives the object position stream on an ephemeral UDP port.
pub struct StateStreamReceiver {
    /// The UDP socket, bound before session creation so its port can be
    /// advertised in the CreateSession request
    socket: UdpSocket,
    /// Cancellation signal from the orchestrator
    shutdown_rx: mpsc::Receiver<()>,
}

impl StateStreamReceiver {
    /// Bind a fresh socket to an OS-chosen ephemeral port.
    ///
    /// Returns the receiver together with the local port to advertise.
    pub async fn bind(shutdown_rx: mpsc::Receiver<()>) -> std::io::Result<(Self, u16)> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let port = socket.local_addr()?.port();
        tracing::debug!("State stream bound to UDP port {}", port);
        Ok((Self { socket, shutdown_rx }, port))
    }

    /// Run the receive loop until cancelled.
    ///
    /// Malformed datagrams are the sole recoverable condition; any other
    /// transport error terminates the loop and is reported upward.
    pub async fn run<S: SnapshotSink>(mut self, mut sink: S) -> Result<(), ReceiverError> {
        let mut buf = [0u8; 2048];

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::debug!("State stream receiver shutting down");
                    return Ok(());
                }
                result = self.socket.recv_from(&mut buf) => {
                    let (len, from) = result?;

                    if len != SNAPSHOT_LEN {
                        tracing::warn!(
                            "Discarding malformed datagram from {}: {} bytes",
                            from,
                            len
                        );
                        continue;
                    }

                    match decode_state_snapshot(&buf[..len]) {
                        Ok(snapshot) => sink.on_snapshot(snapshot),
                        Err(e) => {
                            tracing::warn!("Discarding undecodable datagram from {}: {}", from, e);
                        }
                    }
                }
            }
        }
    }
}
