//! Local IPC frame format for the presence client.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes LE: opcode]
//! [4 bytes LE: payload_len]
//! [payload_len bytes: JSON payload, UTF-8]
//! ```
//!
//! Opcodes: 0 HANDSHAKE, 1 FRAME, 2 CLOSE, 3 PING, 4 PONG.

use std::io::{self, Read, Write};

use serde_json::Value;

use super::PresenceError;

/// Upper bound for an incoming payload. READY frames are a few KiB.
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    pub fn from_u32(raw: u32) -> Result<Self, PresenceError> {
        match raw {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(PresenceError::Protocol(format!("unknown opcode {other}"))),
        }
    }
}

/// Broken pipes and early EOFs mean the other side is gone
pub(crate) fn io_error(e: io::Error) -> PresenceError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => PresenceError::ConnectionClosed(e.to_string()),
        _ => PresenceError::Io(e),
    }
}

/// Writes one frame and flushes.
pub fn write_frame<W: Write>(writer: &mut W, opcode: Opcode, payload: &Value) -> Result<(), PresenceError> {
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len())
        .map_err(|_| PresenceError::Protocol(format!("payload too large: {} bytes", body.len())))?;

    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&(opcode as u32).to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);

    writer.write_all(&frame).map_err(io_error)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

/// Reads one frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(Opcode, Value), PresenceError> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).map_err(io_error)?;

    let opcode = Opcode::from_u32(u32::from_le_bytes([header[0], header[1], header[2], header[3]]))?;
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(PresenceError::Protocol(format!(
            "payload too large: {len} bytes (max {MAX_PAYLOAD_LEN})"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(io_error)?;

    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((opcode, payload))
}
