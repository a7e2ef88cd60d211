//! Session orchestrator
//!
//! Sequences one full round: binds the UDP state stream socket first to
//! learn its ephemeral port, negotiates the session over TCP, starts the
//! receiver in the background once the round is active, drives the
//! control loop to its terminal event, then cancels the receiver and
//! waits for it to stop before returning.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::control::{ControlChannel, ControlError};
use super::stream::{ReceiverError, SnapshotSink, StateStreamReceiver};
use crate::protocol::{ControlEvent, RoundOutcome, SessionConfig};

/// Top-level client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    #[error("State stream receiver failed: {0}")]
    Receiver(#[from] ReceiverError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Options for one session run.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Server control channel address
    pub server: SocketAddr,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

/// Run one complete round against the server and return its outcome.
///
/// The sink is moved into the receiver task and invoked once per valid
/// snapshot datagram; the control loop runs concurrently in the
/// foreground. Cancellation is signaled exactly once, after the control
/// loop reaches a terminal state, and the receiver is joined before this
/// function returns.
pub async fn run<S: SnapshotSink + 'static>(
    config: &SessionConfig,
    options: &SessionOptions,
    sink: S,
) -> ClientResult<RoundOutcome> {
    // UDP first: its ephemeral port goes into the CreateSession request
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let (receiver, udp_port) = StateStreamReceiver::bind(shutdown_rx).await?;

    let mut control = ControlChannel::connect(options.server, options.connect_timeout).await?;
    control.create_session(config, udp_port).await?;
    control.begin_round().await?;

    // Round is active: start ingesting snapshots in the background
    let receiver_task = tokio::spawn(receiver.run(sink));

    let round_result = drive_round(&mut control).await;

    // One-shot cancellation, then wait for the receiver to acknowledge
    // shutdown so no datagram is read off a socket we are abandoning.
    let _ = shutdown_tx.send(()).await;
    let receiver_result = receiver_task
        .await
        .map_err(|e| ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let outcome = match round_result {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Err(re) = receiver_result {
                tracing::warn!("State stream receiver also failed: {}", re);
            }
            return Err(e);
        }
    };
    receiver_result?;

    Ok(outcome)
}

/// Consume control events until the terminal round-end event.
async fn drive_round(control: &mut ControlChannel) -> ClientResult<RoundOutcome> {
    loop {
        match control.next_event().await? {
            ControlEvent::Ping { result } => {
                tracing::debug!("Heartbeat (result {})", result);
            }
            ControlEvent::RoundEnd { winner, .. } => {
                return Ok(RoundOutcome { winner });
            }
        }
    }
}
