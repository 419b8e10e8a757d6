//! GTSDB backend over the line-delimited JSON transport

use tracing::debug;

use super::backend::{Backend, Delivery, InterruptHandle, PubSubBackend, RoundTrip};
use super::raw_connection::{ConnectionFactory, LineConnection};
use crate::utils::{ConnectionError, LineEncoder, OperationError, Request};

/// GTSDB server at a fixed address
#[derive(Debug, Clone)]
pub struct GtsdbBackend {
    addr: String,
    factory: ConnectionFactory,
}

impl GtsdbBackend {
    pub fn new(addr: impl Into<String>, factory: ConnectionFactory) -> Self {
        Self {
            addr: addr.into(),
            factory,
        }
    }
}

/// One GTSDB connection with its request encoder
pub struct GtsdbSession {
    conn: LineConnection,
    encoder: LineEncoder,
}

impl GtsdbSession {
    pub fn new(conn: LineConnection) -> Self {
        Self {
            conn,
            encoder: LineEncoder::with_capacity(256),
        }
    }

    /// Send a request and return the raw response line
    pub fn request(&mut self, request: &Request<'_>) -> Result<&[u8], OperationError> {
        let framed = self.encoder.encode(request)?;
        self.conn.execute(framed)
    }
}

impl RoundTrip for GtsdbSession {
    fn round_trip(&mut self, request: &Request<'_>) -> Result<(), OperationError> {
        // Response content is not inspected; arrival of the line is success
        self.request(request).map(|_| ())
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.conn.interrupt_handle().ok()
    }
}

/// Subscribed GTSDB connection; every received line is one delivery
pub struct GtsdbSubscriber {
    conn: LineConnection,
}

impl Delivery for GtsdbSubscriber {
    fn next_delivery(&mut self) -> Result<(), OperationError> {
        self.conn.read_line().map(|_| ())
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.conn.interrupt_handle().ok()
    }
}

impl Backend for GtsdbBackend {
    type Session = GtsdbSession;

    fn name(&self) -> &'static str {
        "GTSDB"
    }

    fn open(&self) -> Result<GtsdbSession, ConnectionError> {
        self.factory.create(&self.addr).map(GtsdbSession::new)
    }
}

impl PubSubBackend for GtsdbBackend {
    type Publisher = GtsdbSession;
    type Subscriber = GtsdbSubscriber;

    fn name(&self) -> &'static str {
        "GTSDB"
    }

    fn open_publisher(&self) -> Result<GtsdbSession, ConnectionError> {
        self.open()
    }

    fn subscribe(&self, key: &str) -> Result<GtsdbSubscriber, ConnectionError> {
        let mut session = self.open()?;

        // The first line back is the subscription acknowledgment
        let ack = session
            .request(&Request::subscribe(key))
            .map_err(|source| ConnectionError::SubscribeFailed {
                key: key.to_string(),
                source,
            })?;
        debug!(
            "Subscription to {} acknowledged: {}",
            key,
            String::from_utf8_lossy(ack).trim_end()
        );

        Ok(GtsdbSubscriber { conn: session.conn })
    }
}
