//! Control channel client
//!
//! Drives the session lifecycle over the reliable TCP transport:
//! session creation, round begin, and the in-round event stream up to
//! the terminal round-end event.
//!
//! Every read accumulates until the exact expected byte count arrives,
//! since TCP may deliver a message across several partial reads. A short
//! read (peer closed mid-message) is fatal; there is no retry anywhere.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{
    decode_begin_round_reply, decode_create_session_reply, decode_ping, decode_round_end,
    encode_begin_round, encode_create_session, CodecError, ControlEvent, SessionConfig, SessionId,
    BEGIN_ROUND_REPLY_LEN, CREATE_SESSION_REPLY_LEN, PING_BODY_LEN, QUERY_BEGIN_ROUND, QUERY_PING,
    ROUND_END_BODY_LEN,
};

/// Control channel errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed mid-message")]
    ConnectionClosed,

    #[error("Session rejected by server (result code {code})")]
    SessionRejected { code: u8 },

    #[error("Round rejected by server (result code {code})")]
    RoundRejected { code: u8 },

    #[error("Connection timeout")]
    Timeout,

    #[error("Operation not valid in state {0:?}")]
    InvalidState(SessionState),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Lifecycle state of the control channel.
///
/// `RoundEnded` and `Failed` are terminal: no further reads are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connection established, no session yet
    Connected,
    /// CreateSession accepted, session ID captured
    SessionCreated,
    /// BeginRound accepted, consuming the in-round event stream
    RoundActive,
    /// Round-end event observed
    RoundEnded,
    /// A fatal error occurred; reachable from any state
    Failed,
}

/// Client side of the control channel
pub struct ControlChannel {
    /// Server address
    remote_addr: SocketAddr,
    /// The TCP stream
    stream: TcpStream,
    /// Current lifecycle state
    state: SessionState,
    /// Session ID captured from the CreateSession reply
    session_id: Option<SessionId>,
    /// Write buffer
    write_buf: BytesMut,
}

impl ControlChannel {
    /// Connect to the game server's control port.
    pub async fn connect(remote_addr: SocketAddr, timeout: Duration) -> ControlResult<Self> {
        tracing::info!("Connecting to {}", remote_addr);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(remote_addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ControlError::Io(e)),
            Err(_) => return Err(ControlError::Timeout),
        };

        Ok(Self {
            remote_addr,
            stream,
            state: SessionState::Connected,
            session_id: None,
            write_buf: BytesMut::with_capacity(64),
        })
    }

    /// Get the server address
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the session ID (after a successful CreateSession)
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Negotiate a session: send the CreateSession request advertising the
    /// local UDP delivery port, and capture the assigned session ID.
    pub async fn create_session(
        &mut self,
        config: &SessionConfig,
        udp_port: u16,
    ) -> ControlResult<SessionId> {
        if self.state != SessionState::Connected {
            return Err(ControlError::InvalidState(self.state));
        }

        match self.create_session_inner(config, udp_port).await {
            Ok(session_id) => {
                self.state = SessionState::SessionCreated;
                self.session_id = Some(session_id);
                tracing::info!("Session {} created on {}", session_id, self.remote_addr);
                Ok(session_id)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn create_session_inner(
        &mut self,
        config: &SessionConfig,
        udp_port: u16,
    ) -> ControlResult<SessionId> {
        self.write_buf.clear();
        encode_create_session(config, udp_port, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        let mut reply = [0u8; CREATE_SESSION_REPLY_LEN];
        self.read_exact(&mut reply).await?;
        let reply = decode_create_session_reply(&reply)?;

        if reply.result != 0 {
            return Err(ControlError::SessionRejected { code: reply.result });
        }

        Ok(reply.session_id)
    }

    /// Start the round for the negotiated session.
    pub async fn begin_round(&mut self) -> ControlResult<()> {
        if self.state != SessionState::SessionCreated {
            return Err(ControlError::InvalidState(self.state));
        }
        // session_id is always set in SessionCreated
        let session_id = self.session_id.ok_or(ControlError::InvalidState(self.state))?;

        match self.begin_round_inner(session_id).await {
            Ok(()) => {
                self.state = SessionState::RoundActive;
                tracing::info!("Round started for session {}", session_id);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn begin_round_inner(&mut self, session_id: SessionId) -> ControlResult<()> {
        self.write_buf.clear();
        encode_begin_round(session_id, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        let mut reply = [0u8; BEGIN_ROUND_REPLY_LEN];
        self.read_exact(&mut reply).await?;
        let reply = decode_begin_round_reply(&reply)?;

        if reply.result != 0 {
            return Err(ControlError::RoundRejected { code: reply.result });
        }

        Ok(())
    }

    /// Read the next in-round control event. Heartbeats (query 301) keep
    /// the channel in `RoundActive`; the round-end event (query 201) is
    /// terminal. Any other query ID is a protocol violation.
    pub async fn next_event(&mut self) -> ControlResult<ControlEvent> {
        if self.state != SessionState::RoundActive {
            return Err(ControlError::InvalidState(self.state));
        }

        match self.next_event_inner().await {
            Ok(event) => {
                if let ControlEvent::RoundEnd { .. } = event {
                    self.state = SessionState::RoundEnded;
                }
                Ok(event)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn next_event_inner(&mut self) -> ControlResult<ControlEvent> {
        let mut id_buf = [0u8; 4];
        self.read_exact(&mut id_buf).await?;
        let query_id = u32::from_le_bytes(id_buf);

        match query_id {
            QUERY_PING => {
                let mut body = [0u8; PING_BODY_LEN];
                self.read_exact(&mut body).await?;
                let result = decode_ping(&body)?;
                tracing::trace!("Heartbeat from {} (result {})", self.remote_addr, result);
                Ok(ControlEvent::Ping { result })
            }
            QUERY_BEGIN_ROUND => {
                let mut body = [0u8; ROUND_END_BODY_LEN];
                self.read_exact(&mut body).await?;
                let (result, winner) = decode_round_end(&body)?;
                tracing::info!("Round ended: winner {} (result {})", winner, result);
                Ok(ControlEvent::RoundEnd { result, winner })
            }
            other => Err(ControlError::Protocol(CodecError::UnexpectedQueryId {
                expected: QUERY_BEGIN_ROUND,
                got: other,
            })),
        }
    }

    /// Read exactly `buf.len()` bytes, treating a mid-message close as
    /// a `ConnectionClosed` error rather than a short read.
    async fn read_exact(&mut self, buf: &mut [u8]) -> ControlResult<()> {
        match self.stream.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ControlError::ConnectionClosed)
            }
            Err(e) => Err(ControlError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{RoundWinner, CREATE_SESSION_REQUEST_LEN, QUERY_CREATE_SESSION};
    use bytes::BufMut;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn test_config() -> SessionConfig {
        SessionConfig {
            field_width: 800,
            field_height: 600,
            win_score: 5,
            game_time: 300,
            ball_speed: 400,
            ball_radius: 20,
            paddle_speed: 400,
            paddle_size: 300,
            paddle_offset: 100,
        }
    }

    async fn read_create_session(sock: &mut TcpStream) -> [u8; CREATE_SESSION_REQUEST_LEN] {
        let mut req = [0u8; CREATE_SESSION_REQUEST_LEN];
        sock.read_exact(&mut req).await.unwrap();
        assert_eq!(
            u32::from_le_bytes(req[0..4].try_into().unwrap()),
            QUERY_CREATE_SESSION
        );
        req
    }

    #[tokio::test]
    async fn test_create_session_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let req = read_create_session(&mut sock).await;
            // Config fields arrive little-endian, the UDP port big-endian
            assert_eq!(u32::from_le_bytes(req[4..8].try_into().unwrap()), 800);
            assert_eq!(u16::from_be_bytes([req[40], req[41]]), 9981);

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(42);
            sock.write_all(&reply).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        let id = chan.create_session(&test_config(), 9981).await.unwrap();

        assert_eq!(id, SessionId(42));
        assert_eq!(chan.session_id(), Some(SessionId(42)));
        assert_eq!(chan.state(), SessionState::SessionCreated);

        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_create_session_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(3);
            reply.put_u32_le(0);
            sock.write_all(&reply).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        let err = chan.create_session(&test_config(), 9981).await.unwrap_err();

        assert!(matches!(err, ControlError::SessionRejected { code: 3 }));
        assert_eq!(chan.state(), SessionState::Failed);
        assert_eq!(chan.session_id(), None);

        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_reply_split_across_partial_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(7);

            sock.write_all(&reply[..3]).await.unwrap();
            sock.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            sock.write_all(&reply[3..]).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        let id = chan.create_session(&test_config(), 1234).await.unwrap();

        assert_eq!(id, SessionId(7));
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_connection_closed_mid_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            // 4 of the 9 reply bytes, then close
            sock.write_all(&101u32.to_le_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        let err = chan.create_session(&test_config(), 1234).await.unwrap_err();

        assert!(matches!(err, ControlError::ConnectionClosed));
        assert_eq!(chan.state(), SessionState::Failed);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_round_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(9);
            sock.write_all(&reply).await.unwrap();

            let mut req = [0u8; 8];
            sock.read_exact(&mut req).await.unwrap();
            assert_eq!(u32::from_le_bytes(req[0..4].try_into().unwrap()), 201);
            assert_eq!(u32::from_le_bytes(req[4..8].try_into().unwrap()), 9);

            let mut reply = BytesMut::new();
            reply.put_u32_le(201);
            reply.put_u8(1);
            sock.write_all(&reply).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        chan.create_session(&test_config(), 1234).await.unwrap();
        let err = chan.begin_round().await.unwrap_err();

        assert!(matches!(err, ControlError::RoundRejected { code: 1 }));
        assert_eq!(chan.state(), SessionState::Failed);

        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_pings_then_round_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(1);
            sock.write_all(&reply).await.unwrap();

            let mut req = [0u8; 8];
            sock.read_exact(&mut req).await.unwrap();

            let mut reply = BytesMut::new();
            reply.put_u32_le(201);
            reply.put_u8(0);
            sock.write_all(&reply).await.unwrap();

            // Three heartbeats, then the round-end event
            for _ in 0..3 {
                let mut ping = BytesMut::new();
                ping.put_u32_le(301);
                ping.put_u8(0);
                sock.write_all(&ping).await.unwrap();
            }
            let mut end = BytesMut::new();
            end.put_u32_le(201);
            end.put_u8(0);
            end.put_u32_le(1);
            sock.write_all(&end).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        chan.create_session(&test_config(), 1234).await.unwrap();
        chan.begin_round().await.unwrap();
        assert_eq!(chan.state(), SessionState::RoundActive);

        let mut pings = 0;
        let winner = loop {
            match chan.next_event().await.unwrap() {
                ControlEvent::Ping { .. } => {
                    pings += 1;
                    assert_eq!(chan.state(), SessionState::RoundActive);
                }
                ControlEvent::RoundEnd { winner, .. } => break winner,
            }
        };

        assert_eq!(pings, 3);
        assert_eq!(winner, RoundWinner::PlayerA);
        assert_eq!(chan.state(), SessionState::RoundEnded);

        // Terminal state: no further reads are issued
        assert!(matches!(
            chan.next_event().await,
            Err(ControlError::InvalidState(SessionState::RoundEnded))
        ));

        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_query_id_fails_round() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(1);
            sock.write_all(&reply).await.unwrap();

            let mut req = [0u8; 8];
            sock.read_exact(&mut req).await.unwrap();

            let mut reply = BytesMut::new();
            reply.put_u32_le(201);
            reply.put_u8(0);
            sock.write_all(&reply).await.unwrap();

            sock.write_all(&999u32.to_le_bytes()).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        chan.create_session(&test_config(), 1234).await.unwrap();
        chan.begin_round().await.unwrap();

        let err = chan.next_event().await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::Protocol(CodecError::UnexpectedQueryId { got: 999, .. })
        ));
        assert_eq!(chan.state(), SessionState::Failed);

        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_create_session_requires_connected_state() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            read_create_session(&mut sock).await;

            let mut reply = BytesMut::new();
            reply.put_u32_le(101);
            reply.put_u8(0);
            reply.put_u32_le(5);
            sock.write_all(&reply).await.unwrap();
            sock
        });

        let mut chan = ControlChannel::connect(addr, TIMEOUT).await.unwrap();
        chan.create_session(&test_config(), 1234).await.unwrap();

        let err = chan.create_session(&test_config(), 1234).await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::InvalidState(SessionState::SessionCreated)
        ));

        drop(server.await.unwrap());
    }
}
