//! GTSDB line-delimited JSON codec
//!
//! Every request and every response is one JSON document terminated by a
//! single `\n`. Field names are lower-case; optional read selectors are
//! omitted when unset.

use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};

/// Line delimiter for both directions
pub const LINE_DELIMITER: u8 = b'\n';

/// Write payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WritePayload {
    pub value: f64,
}

/// Read selector: time range, downsampling and last-N
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSelector {
    #[serde(rename = "start_timestamp", skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(rename = "end_timestamp", skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsampling: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastx: Option<u32>,
}

impl ReadSelector {
    /// Select the most recent `n` samples
    pub fn last(n: u32) -> Self {
        Self {
            lastx: Some(n),
            ..Self::default()
        }
    }
}

/// A single GTSDB request envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Request<'a> {
    Write { key: &'a str, write: WritePayload },
    Read { key: &'a str, read: ReadSelector },
    Subscribe { key: &'a str },
}

impl<'a> Request<'a> {
    pub fn write(key: &'a str, value: f64) -> Self {
        Request::Write {
            key,
            write: WritePayload { value },
        }
    }

    pub fn read(key: &'a str, selector: ReadSelector) -> Self {
        Request::Read {
            key,
            read: selector,
        }
    }

    pub fn subscribe(key: &'a str) -> Self {
        Request::Subscribe { key }
    }

    /// Target key (sensor id)
    pub fn key(&self) -> &'a str {
        match self {
            Request::Write { key, .. } | Request::Read { key, .. } | Request::Subscribe { key } => {
                *key
            }
        }
    }

    /// Operation tag as it appears on the wire
    pub fn operation(&self) -> &'static str {
        match self {
            Request::Write { .. } => "write",
            Request::Read { .. } => "read",
            Request::Subscribe { .. } => "subscribe",
        }
    }
}

/// Request encoder with a reusable buffer
pub struct LineEncoder {
    buf: Vec<u8>,
}

impl LineEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Encode a request followed by the line delimiter
    ///
    /// The buffer is cleared first, so the returned slice always holds
    /// exactly one framed request.
    pub fn encode(&mut self, request: &Request<'_>) -> serde_json::Result<&[u8]> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, request)?;
        self.buf.push(LINE_DELIMITER);
        Ok(&self.buf)
    }
}

/// Streaming line reader
pub struct LineDecoder<R> {
    reader: R,
    line_buf: Vec<u8>,
}

impl<R: BufRead> LineDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: Vec::with_capacity(256),
        }
    }

    /// Read the next line, delimiter included
    ///
    /// Returns `UnexpectedEof` when the peer closed before sending a
    /// complete line.
    pub fn decode(&mut self) -> io::Result<&[u8]> {
        self.line_buf.clear();
        let read = self.reader.read_until(LINE_DELIMITER, &mut self.line_buf)?;

        if read == 0 || self.line_buf.last() != Some(&LINE_DELIMITER) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed",
            ));
        }

        Ok(&self.line_buf)
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }
}
