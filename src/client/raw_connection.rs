//! Raw TCP connection for benchmark traffic
//!
//! Direct TCP connections with separate buffered reader/writer halves.
//! Every socket gets read and write timeouts so a silent peer cannot block
//! a worker forever.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::backend::InterruptHandle;
use crate::utils::line_json::LINE_DELIMITER;
use crate::utils::{ConnectionError, LineDecoder, OperationError};

/// Line-framed TCP connection (the GTSDB transport)
pub struct LineConnection {
    writer: BufWriter<TcpStream>,
    decoder: LineDecoder<BufReader<TcpStream>>,
}

impl LineConnection {
    /// Connect with default timeouts
    pub fn connect(addr: &str, connect_timeout: Duration) -> Result<Self, ConnectionError> {
        let factory = ConnectionFactory {
            connect_timeout,
            ..ConnectionFactory::default()
        };
        factory.create(addr)
    }

    /// Wrap an already configured stream
    pub fn from_stream(stream: TcpStream, peer: &str) -> Result<Self, ConnectionError> {
        let writer = BufWriter::with_capacity(
            16 * 1024,
            stream
                .try_clone()
                .map_err(|e| ConnectionError::ConnectFailed {
                    addr: peer.to_string(),
                    source: e,
                })?,
        );
        let reader = BufReader::with_capacity(16 * 1024, stream);

        Ok(Self {
            writer,
            decoder: LineDecoder::new(reader),
        })
    }

    /// Write already framed bytes and flush
    pub fn send(&mut self, framed: &[u8]) -> Result<(), OperationError> {
        self.writer
            .write_all(framed)
            .and_then(|_| self.writer.flush())
            .map_err(OperationError::Send)
    }

    /// Write `payload` followed by the line delimiter
    pub fn send_line(&mut self, payload: &[u8]) -> Result<(), OperationError> {
        self.writer
            .write_all(payload)
            .and_then(|_| self.writer.write_all(&[LINE_DELIMITER]))
            .and_then(|_| self.writer.flush())
            .map_err(OperationError::Send)
    }

    /// Block until one full line arrives; delimiter included
    pub fn read_line(&mut self) -> Result<&[u8], OperationError> {
        self.decoder.decode().map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => OperationError::Closed,
            _ => OperationError::Receive(e),
        })
    }

    /// Send a framed request and wait for one response line
    pub fn execute(&mut self, framed: &[u8]) -> Result<&[u8], OperationError> {
        self.send(framed)?;
        self.read_line()
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.decoder.get_ref().get_ref().set_read_timeout(timeout)
    }

    /// Handle for interrupting blocked reads from another thread
    pub fn interrupt_handle(&self) -> io::Result<InterruptHandle> {
        self.writer.get_ref().try_clone().map(InterruptHandle::new)
    }
}

/// Connection factory for creating connections with common config
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionFactory {
    /// Resolve `addr` and connect to the first address that accepts
    pub fn connect_stream(&self, addr: &str) -> Result<TcpStream, ConnectionError> {
        let candidates = addr
            .to_socket_addrs()
            .map_err(|e| ConnectionError::ConnectFailed {
                addr: addr.to_string(),
                source: e,
            })?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).ok();
                    stream.set_read_timeout(Some(self.read_timeout)).ok();
                    stream.set_write_timeout(Some(self.write_timeout)).ok();
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(source) if source.kind() == io::ErrorKind::TimedOut => Err(
                ConnectionError::Timeout(self.connect_timeout.as_millis() as u64),
            ),
            Some(source) => Err(ConnectionError::ConnectFailed {
                addr: addr.to_string(),
                source,
            }),
            None => Err(ConnectionError::Unresolved(addr.to_string())),
        }
    }

    /// Create a new line-framed connection to `addr`
    pub fn create(&self, addr: &str) -> Result<LineConnection, ConnectionError> {
        let stream = self.connect_stream(addr)?;
        LineConnection::from_stream(stream, addr)
    }
}
