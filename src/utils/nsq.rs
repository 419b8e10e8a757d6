//! NSQ TCP protocol (V2) encoder and frame decoder
//!
//! Commands are newline-terminated text; `PUB` carries a 4-byte big-endian
//! body length. Server frames are `[size: u32][type: u32][data]` where
//! `size` counts the type field plus the data.

use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use super::error::{OperationError, ProtocolError};

/// Protocol magic sent once right after connecting
pub const MAGIC_V2: &[u8; 4] = b"  V2";

pub const FRAME_TYPE_RESPONSE: u32 = 0;
pub const FRAME_TYPE_ERROR: u32 = 1;
pub const FRAME_TYPE_MESSAGE: u32 = 2;

/// Heartbeat response body; must be answered with `NOP`
pub const HEARTBEAT: &[u8] = b"_heartbeat_";

/// Upper bound on a single frame (nsqd defaults to 1MB messages)
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Message id length in bytes
pub const MESSAGE_ID_LEN: usize = 16;

/// timestamp (8) + attempts (2) + id (16)
const MESSAGE_HEADER_LEN: usize = 8 + 2 + MESSAGE_ID_LEN;

/// Published message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMessage {
    pub key: String,
    pub value: f64,
}

/// A delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    /// Nanoseconds since the epoch, set by nsqd
    pub timestamp: i64,
    pub attempts: u16,
    pub id: [u8; MESSAGE_ID_LEN],
    pub body: Vec<u8>,
}

/// Decoded server frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Response(Vec<u8>),
    Error(Vec<u8>),
    Message(MessageFrame),
}

impl Frame {
    /// Check if this is a heartbeat
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Frame::Response(data) if data == HEARTBEAT)
    }

    /// Check if this is a plain `OK` response
    pub fn is_ok(&self) -> bool {
        matches!(self, Frame::Response(data) if data == b"OK")
    }

    /// Parse a frame from its type and data
    pub fn parse(frame_type: u32, data: Vec<u8>) -> Result<Self, ProtocolError> {
        match frame_type {
            FRAME_TYPE_RESPONSE => Ok(Frame::Response(data)),
            FRAME_TYPE_ERROR => Ok(Frame::Error(data)),
            FRAME_TYPE_MESSAGE => {
                if data.len() < MESSAGE_HEADER_LEN {
                    return Err(ProtocolError::FrameTooShort {
                        size: data.len(),
                        minimum: MESSAGE_HEADER_LEN,
                    });
                }
                let mut ts = [0u8; 8];
                ts.copy_from_slice(&data[0..8]);
                let attempts = u16::from_be_bytes([data[8], data[9]]);
                let mut id = [0u8; MESSAGE_ID_LEN];
                id.copy_from_slice(&data[10..MESSAGE_HEADER_LEN]);

                Ok(Frame::Message(MessageFrame {
                    timestamp: i64::from_be_bytes(ts),
                    attempts,
                    id,
                    body: data[MESSAGE_HEADER_LEN..].to_vec(),
                }))
            }
            other => Err(ProtocolError::InvalidFrameType(other)),
        }
    }

    /// Short human-readable description (for logging)
    pub fn describe(&self) -> String {
        match self {
            Frame::Response(data) => String::from_utf8_lossy(data).into_owned(),
            Frame::Error(data) => String::from_utf8_lossy(data).into_owned(),
            Frame::Message(msg) => format!("message ({} bytes)", msg.body.len()),
        }
    }
}

/// NSQ command encoder with a reusable buffer
pub struct NsqEncoder {
    buf: Vec<u8>,
}

impl NsqEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// `PUB <topic>\n[size][body]`
    pub fn encode_pub(&mut self, topic: &str, body: &[u8]) {
        self.buf.extend_from_slice(b"PUB ");
        self.buf.extend_from_slice(topic.as_bytes());
        self.buf.push(b'\n');
        self.buf
            .extend_from_slice(&(body.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(body);
    }

    /// `SUB <topic> <channel>\n`
    pub fn encode_sub(&mut self, topic: &str, channel: &str) {
        self.encode_line(&["SUB", topic, channel]);
    }

    /// `RDY <count>\n`
    pub fn encode_rdy(&mut self, count: u32) {
        let count = count.to_string();
        self.encode_line(&["RDY", &count]);
    }

    /// `FIN <message_id>\n`
    pub fn encode_fin(&mut self, id: &[u8; MESSAGE_ID_LEN]) {
        self.buf.extend_from_slice(b"FIN ");
        self.buf.extend_from_slice(id);
        self.buf.push(b'\n');
    }

    /// `NOP\n`
    pub fn encode_nop(&mut self) {
        self.encode_line(&["NOP"]);
    }

    /// `CLS\n`
    pub fn encode_cls(&mut self) {
        self.encode_line(&["CLS"]);
    }

    fn encode_line(&mut self, parts: &[&str]) {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.buf.extend_from_slice(part.as_bytes());
        }
        self.buf.push(b'\n');
    }
}

/// Streaming frame decoder
pub struct FrameDecoder<R> {
    reader: R,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decode next frame from stream
    pub fn decode(&mut self) -> Result<Frame, OperationError> {
        let mut header = [0u8; 4];
        self.read_exact(&mut header)?;
        let size = u32::from_be_bytes(header) as usize;

        if size < 4 {
            return Err(ProtocolError::FrameTooShort { size, minimum: 4 }.into());
        }
        if size > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge(size).into());
        }

        self.read_exact(&mut header)?;
        let frame_type = u32::from_be_bytes(header);

        let mut data = vec![0u8; size - 4];
        self.read_exact(&mut data)?;

        Ok(Frame::parse(frame_type, data)?)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), OperationError> {
        self.reader.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => OperationError::Closed,
            _ => OperationError::Receive(e),
        })
    }
}

/// Encode a frame (used by tests and mock servers)
pub fn encode_frame(frame_type: u32, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&((data.len() + 4) as u32).to_be_bytes());
    out.extend_from_slice(&frame_type.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Encode a message frame
pub fn encode_message_frame(msg: &MessageFrame) -> Vec<u8> {
    let mut data = Vec::with_capacity(MESSAGE_HEADER_LEN + msg.body.len());
    data.extend_from_slice(&msg.timestamp.to_be_bytes());
    data.extend_from_slice(&msg.attempts.to_be_bytes());
    data.extend_from_slice(&msg.id);
    data.extend_from_slice(&msg.body);
    encode_frame(FRAME_TYPE_MESSAGE, &data)
}
