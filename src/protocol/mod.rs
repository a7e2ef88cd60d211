//! Protocol module - Defines the wire protocol spoken with the game server
//!
//! The protocol is split across two transports:
//! - TCP control channel: fixed-layout session lifecycle queries, each
//!   tagged with a 4-byte little-endian query ID
//! - UDP state stream: 16-byte object position snapshots
//!
//! All integers are little-endian, with one exception: the UDP delivery
//! port embedded in the CreateSession request is big-endian (network order).

mod message;
mod codec;

pub use message::*;
pub use codec::*;

/// Default TCP port of the game server
pub const DEFAULT_PORT: u16 = 9180;

/// Query ID for CreateSession request/reply
pub const QUERY_CREATE_SESSION: u32 = 101;

/// Query ID for BeginRound request/reply and the unsolicited round-end event
pub const QUERY_BEGIN_ROUND: u32 = 201;

/// Query ID for the unsolicited server heartbeat
pub const QUERY_PING: u32 = 301;

/// CreateSession request: id(4) + 9 config fields(36) + udp port(2)
pub const CREATE_SESSION_REQUEST_LEN: usize = 42;

/// CreateSession reply: id(4) + result(1) + session id(4)
pub const CREATE_SESSION_REPLY_LEN: usize = 9;

/// BeginRound request: id(4) + session id(4)
pub const BEGIN_ROUND_REQUEST_LEN: usize = 8;

/// BeginRound reply: id(4) + result(1)
pub const BEGIN_ROUND_REPLY_LEN: usize = 5;

/// Round-end event body after the query ID: result(1) + winner(4)
pub const ROUND_END_BODY_LEN: usize = 5;

/// Ping body after the query ID: result(1)
pub const PING_BODY_LEN: usize = 1;

/// State snapshot datagram: 4 little-endian f32
pub const SNAPSHOT_LEN: usize = 16;
