//! Protocol message definitions
//!
//! Typed counterparts of the fixed-layout messages exchanged with the
//! game server, plus the domain types they carry.

use serde::{Deserialize, Serialize};

/// Parameters of a game session, sent once at session creation
/// and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Playing field width in screen units
    pub field_width: u32,
    /// Playing field height in screen units
    pub field_height: u32,
    /// Score needed to win the match
    pub win_score: u32,
    /// Round time limit in seconds
    pub game_time: u32,
    /// Ball speed in units per second
    pub ball_speed: u32,
    /// Ball radius in units
    pub ball_radius: u32,
    /// Paddle speed in units per second
    pub paddle_speed: u32,
    /// Paddle length in units
    pub paddle_size: u32,
    /// Paddle distance from its wall
    pub paddle_offset: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        // Defaults match the reference server's demo parameters
        Self {
            field_width: 800,
            field_height: 400,
            win_score: 5,
            game_time: 20,
            ball_speed: 200,
            ball_radius: 30,
            paddle_speed: 600,
            paddle_size: 200,
            paddle_offset: 100,
        }
    }
}

/// Opaque server-assigned session identifier.
///
/// Valid from a successful CreateSession reply until the round-end event
/// is observed or the control connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two player slots, plus the draw outcome the server reports
/// when the round timer expires with no winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RoundWinner {
    Draw = 0,
    PlayerA = 1,
    PlayerB = 2,
}

impl RoundWinner {
    /// Map the wire value from the round-end event.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(RoundWinner::Draw),
            1 => Some(RoundWinner::PlayerA),
            2 => Some(RoundWinner::PlayerB),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoundWinner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundWinner::Draw => write!(f, "draw"),
            RoundWinner::PlayerA => write!(f, "player A"),
            RoundWinner::PlayerB => write!(f, "player B"),
        }
    }
}

/// Terminal result of one round, produced exactly once by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub winner: RoundWinner,
}

/// One instantaneous state update from the UDP stream.
///
/// Snapshots carry no sequence number or timestamp; the latest decoded
/// snapshot supersedes all previous ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    /// Ball position
    pub ball_x: f32,
    pub ball_y: f32,
    /// Vertical paddle offsets from their base positions
    pub paddle_a: f32,
    pub paddle_b: f32,
}

/// Decoded CreateSession reply.
#[derive(Debug, Clone, Copy)]
pub struct CreateSessionReply {
    pub result: u8,
    pub session_id: SessionId,
}

/// Decoded BeginRound reply.
#[derive(Debug, Clone, Copy)]
pub struct BeginRoundReply {
    pub result: u8,
}

/// A message observed on the control channel while a round is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Server heartbeat (query 301); the result code is informational only.
    Ping { result: u8 },
    /// Unsolicited round-end event (query 201). The result code is decoded
    /// but the server never sets it meaningfully; the winner is the payload.
    RoundEnd { result: u8, winner: RoundWinner },
}
