//! Utility modules

pub mod error;
pub mod line_json;
pub mod nsq;

pub use error::{BenchmarkError, ConnectionError, OperationError, ProtocolError, Result};
pub use line_json::{LineDecoder, LineEncoder, ReadSelector, Request, WritePayload};
