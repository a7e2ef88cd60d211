//! Protocol codec for encoding/decoding messages
//!
//! Handles the fixed-layout byte encodings used on both transports.
//! Outbound encoding is infallible: every field is typed at exactly its
//! wire width, so a value that does not fit cannot be constructed.
//! Inbound decoding validates both the buffer length and the query ID;
//! a mismatch in either is a protocol violation and fatal to the session.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{
    BeginRoundReply, CreateSessionReply, RoundWinner, SessionConfig, SessionId, StateSnapshot,
    BEGIN_ROUND_REPLY_LEN, CREATE_SESSION_REPLY_LEN, PING_BODY_LEN, QUERY_BEGIN_ROUND,
    QUERY_CREATE_SESSION, ROUND_END_BODY_LEN, SNAPSHOT_LEN,
};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unexpected query ID: expected {expected}, got {got}")]
    UnexpectedQueryId { expected: u32, got: u32 },

    #[error("wrong payload length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("unknown winner ID: {0}")]
    UnknownWinner(u32),
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), CodecError> {
    if buf.len() != expected {
        return Err(CodecError::WrongLength {
            expected,
            got: buf.len(),
        });
    }
    Ok(())
}

fn check_query_id(got: u32, expected: u32) -> Result<(), CodecError> {
    if got != expected {
        return Err(CodecError::UnexpectedQueryId { expected, got });
    }
    Ok(())
}

/// Encode a CreateSession request.
///
/// Layout: query ID and nine u32 config fields little-endian, then the
/// local UDP delivery port as a big-endian u16 (the protocol's one
/// network-byte-order field).
pub fn encode_create_session(config: &SessionConfig, udp_port: u16, buf: &mut BytesMut) {
    buf.put_u32_le(QUERY_CREATE_SESSION);
    buf.put_u32_le(config.field_width);
    buf.put_u32_le(config.field_height);
    buf.put_u32_le(config.win_score);
    buf.put_u32_le(config.game_time);
    buf.put_u32_le(config.ball_speed);
    buf.put_u32_le(config.ball_radius);
    buf.put_u32_le(config.paddle_speed);
    buf.put_u32_le(config.paddle_size);
    buf.put_u32_le(config.paddle_offset);
    buf.put_u16(udp_port);
}

/// Decode a CreateSession reply (exactly 9 bytes, query ID 101).
pub fn decode_create_session_reply(mut buf: &[u8]) -> Result<CreateSessionReply, CodecError> {
    check_len(buf, CREATE_SESSION_REPLY_LEN)?;
    check_query_id(buf.get_u32_le(), QUERY_CREATE_SESSION)?;
    let result = buf.get_u8();
    let session_id = SessionId(buf.get_u32_le());
    Ok(CreateSessionReply { result, session_id })
}

/// Encode a BeginRound request.
pub fn encode_begin_round(session_id: SessionId, buf: &mut BytesMut) {
    buf.put_u32_le(QUERY_BEGIN_ROUND);
    buf.put_u32_le(session_id.0);
}

/// Decode a BeginRound reply (exactly 5 bytes, query ID 201).
pub fn decode_begin_round_reply(mut buf: &[u8]) -> Result<BeginRoundReply, CodecError> {
    check_len(buf, BEGIN_ROUND_REPLY_LEN)?;
    check_query_id(buf.get_u32_le(), QUERY_BEGIN_ROUND)?;
    Ok(BeginRoundReply {
        result: buf.get_u8(),
    })
}

/// Decode the round-end event body that follows an unsolicited query ID 201
/// on the control stream: result code and winner ID.
pub fn decode_round_end(mut buf: &[u8]) -> Result<(u8, RoundWinner), CodecError> {
    check_len(buf, ROUND_END_BODY_LEN)?;
    let result = buf.get_u8();
    let raw = buf.get_u32_le();
    let winner = RoundWinner::from_wire(raw).ok_or(CodecError::UnknownWinner(raw))?;
    Ok((result, winner))
}

/// Decode the heartbeat body that follows query ID 301. The result code
/// carries no meaning; it is surfaced only for logging.
pub fn decode_ping(buf: &[u8]) -> Result<u8, CodecError> {
    check_len(buf, PING_BODY_LEN)?;
    Ok(buf[0])
}

/// Decode a 16-byte state snapshot datagram: four little-endian f32.
pub fn decode_state_snapshot(mut buf: &[u8]) -> Result<StateSnapshot, CodecError> {
    check_len(buf, SNAPSHOT_LEN)?;
    Ok(StateSnapshot {
        ball_x: buf.get_f32_le(),
        ball_y: buf.get_f32_le(),
        paddle_a: buf.get_f32_le(),
        paddle_b: buf.get_f32_le(),
    })
}
