//! Capability traits implemented by every benchmark target
//!
//! The drivers in `crate::benchmark` are written once against these
//! traits. A `Backend` opens independent sessions; a session performs one
//! request/response round-trip at a time. Pub/sub targets additionally
//! hand out an acknowledged subscriber.

use std::net::{Shutdown, TcpStream};

use crate::utils::{ConnectionError, OperationError, Request};

/// One request/response exchange over an owned connection
pub trait RoundTrip {
    /// Send one request and wait for its acknowledgment
    fn round_trip(&mut self, request: &Request<'_>) -> Result<(), OperationError>;

    /// Handle that can unblock this session from another thread
    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        None
    }
}

/// Opens sessions against a benchmark target
///
/// Sessions are opened inside the worker that uses them, so they need not
/// be `Send`; the backend itself is shared by reference across workers.
pub trait Backend: Sync {
    type Session: RoundTrip;

    /// Display name used in reports ("GTSDB", "InfluxDB", ...)
    fn name(&self) -> &'static str;

    /// Open a new, exclusively owned session
    fn open(&self) -> Result<Self::Session, ConnectionError>;
}

/// Receiving end of a subscription
pub trait Delivery {
    /// Block until one message has been delivered
    fn next_delivery(&mut self) -> Result<(), OperationError>;

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        None
    }

    /// Tell the server no more deliveries are wanted
    fn close(&mut self) {}
}

/// Target supporting publish/subscribe
pub trait PubSubBackend: Sync {
    type Publisher: RoundTrip + Send;
    type Subscriber: Delivery + Send;

    fn name(&self) -> &'static str;

    fn open_publisher(&self) -> Result<Self::Publisher, ConnectionError>;

    /// Subscribe to `key` and return once the server acknowledged it
    fn subscribe(&self, key: &str) -> Result<Self::Subscriber, ConnectionError>;
}

/// Cloned socket used to abort blocking reads on shutdown
#[derive(Debug)]
pub struct InterruptHandle(TcpStream);

impl InterruptHandle {
    pub fn new(stream: TcpStream) -> Self {
        Self(stream)
    }

    /// Shut the socket down in both directions; pending reads return EOF
    pub fn interrupt(&self) {
        self.0.shutdown(Shutdown::Both).ok();
    }
}
