//! Error types for gtsdb-bench

use std::io;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Connection establishment errors
///
/// Any of these aborts every operation the affected worker would have run.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {addr}: {source}")]
    ConnectFailed { addr: String, source: io::Error },

    #[error("No addresses resolved for {0}")]
    Unresolved(String),

    #[error("Handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("Subscription to {key} was not acknowledged: {source}")]
    SubscribeFailed { key: String, source: OperationError },

    #[error("Connection timeout after {0}ms")]
    Timeout(u64),
}

/// Failure of a single round-trip
///
/// Counted as one failed operation; never retried.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("send failed: {0}")]
    Send(io::Error),

    #[error("receive failed: {0}")]
    Receive(io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{backend} does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

/// Wire-level decoding errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid NSQ frame type: {0}")]
    InvalidFrameType(u32),

    #[error("Frame too short: {size} bytes, minimum {minimum} bytes")]
    FrameTooShort { size: usize, minimum: usize },

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, BenchmarkError>;
