//! NSQ producer and consumer over the V2 TCP protocol
//!
//! The producer publishes one JSON sensor message per round-trip and waits
//! for nsqd's `OK`. The consumer subscribes to a topic/channel, keeps
//! `max_in_flight` messages outstanding and finishes each delivery.
//!
//! nsqd hands messages queued on a topic without channels to the first
//! channel created, so the consumer only counts messages carrying its own
//! key. Pub/sub also runs on a topic of its own, never the write topic.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;

use tracing::debug;

use super::backend::{Backend, Delivery, InterruptHandle, PubSubBackend, RoundTrip};
use super::raw_connection::ConnectionFactory;
use crate::utils::nsq::{Frame, FrameDecoder, NsqEncoder, SensorMessage, MAGIC_V2};
use crate::utils::{ConnectionError, OperationError, ProtocolError, Request};

/// nsqd endpoint and subscription settings
#[derive(Debug, Clone)]
pub struct NsqConfig {
    pub addr: String,
    /// Topic written by the write workloads
    pub topic: String,
    /// Topic published and consumed by pub/sub
    pub pubsub_topic: String,
    pub channel: String,
    /// RDY count announced by the consumer
    pub max_in_flight: u32,
}

/// Raw nsqd connection
struct NsqConnection {
    writer: BufWriter<TcpStream>,
    decoder: FrameDecoder<BufReader<TcpStream>>,
    encoder: NsqEncoder,
}

impl NsqConnection {
    /// Connect and send the protocol magic
    fn open(factory: &ConnectionFactory, addr: &str) -> Result<Self, ConnectionError> {
        let stream = factory.connect_stream(addr)?;
        let reader_stream = stream
            .try_clone()
            .map_err(|e| ConnectionError::ConnectFailed {
                addr: addr.to_string(),
                source: e,
            })?;

        let mut writer = BufWriter::with_capacity(16 * 1024, stream);
        writer
            .write_all(MAGIC_V2)
            .and_then(|_| writer.flush())
            .map_err(|e| ConnectionError::Handshake {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            writer,
            decoder: FrameDecoder::new(BufReader::with_capacity(16 * 1024, reader_stream)),
            encoder: NsqEncoder::with_capacity(256),
        })
    }

    /// Flush whatever the encoder holds
    fn flush_encoded(&mut self) -> Result<(), OperationError> {
        let result = self
            .writer
            .write_all(self.encoder.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(OperationError::Send);
        self.encoder.clear();
        result
    }

    fn send_nop(&mut self) -> Result<(), OperationError> {
        self.encoder.encode_nop();
        self.flush_encoded()
    }

    /// Next frame that is not a heartbeat; heartbeats are answered inline
    fn read_frame(&mut self) -> Result<Frame, OperationError> {
        loop {
            let frame = self.decoder.decode()?;
            if frame.is_heartbeat() {
                self.send_nop()?;
                continue;
            }
            return Ok(frame);
        }
    }

    /// Wait for the `OK` answering the last command
    fn expect_ok(&mut self) -> Result<(), OperationError> {
        match self.read_frame()? {
            frame if frame.is_ok() => Ok(()),
            Frame::Error(data) => Err(OperationError::Rejected(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "OK".to_string(),
                actual: other.describe(),
            }
            .into()),
        }
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.writer
            .get_ref()
            .try_clone()
            .ok()
            .map(InterruptHandle::new)
    }
}

/// Publishing connection
pub struct NsqProducer {
    conn: NsqConnection,
    topic: String,
    body: Vec<u8>,
}

impl NsqProducer {
    /// Publish one raw message body and wait for `OK`
    pub fn publish(&mut self, body: &[u8]) -> Result<(), OperationError> {
        self.conn.encoder.encode_pub(&self.topic, body);
        self.conn.flush_encoded()?;
        self.conn.expect_ok()
    }
}

impl RoundTrip for NsqProducer {
    fn round_trip(&mut self, request: &Request<'_>) -> Result<(), OperationError> {
        match request {
            Request::Write { key, write } => {
                let message = SensorMessage {
                    key: key.to_string(),
                    value: write.value,
                };
                let mut body = std::mem::take(&mut self.body);
                body.clear();
                let result = serde_json::to_writer(&mut body, &message)
                    .map_err(OperationError::from)
                    .and_then(|_| self.publish(&body));
                self.body = body;
                result
            }
            other => Err(OperationError::Unsupported {
                backend: "NSQ",
                operation: other.operation(),
            }),
        }
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.conn.interrupt_handle()
    }
}

/// Subscribed consumer connection
pub struct NsqConsumer {
    conn: NsqConnection,
    key: String,
    skipped: u64,
}

impl NsqConsumer {
    fn is_own(&self, body: &[u8]) -> bool {
        serde_json::from_slice::<SensorMessage>(body).is_ok_and(|m| m.key == self.key)
    }
}

impl Delivery for NsqConsumer {
    fn next_delivery(&mut self) -> Result<(), OperationError> {
        loop {
            match self.conn.read_frame()? {
                Frame::Message(message) => {
                    self.conn.encoder.encode_fin(&message.id);
                    self.conn.flush_encoded()?;
                    if self.is_own(&message.body) {
                        return Ok(());
                    }
                    self.skipped += 1;
                    if self.skipped == 1 {
                        debug!("Skipping NSQ messages not published under {}", self.key);
                    }
                }
                Frame::Error(data) => {
                    return Err(OperationError::Rejected(
                        String::from_utf8_lossy(&data).into_owned(),
                    ));
                }
                // Late responses (e.g. CLOSE_WAIT) carry no delivery
                Frame::Response(_) => continue,
            }
        }
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.conn.interrupt_handle()
    }

    /// Announce `CLS` so nsqd stops sending; best effort
    fn close(&mut self) {
        if self.skipped > 0 {
            debug!("Skipped {} foreign NSQ messages", self.skipped);
        }
        self.conn.encoder.encode_cls();
        self.conn.flush_encoded().ok();
    }
}

/// nsqd target
#[derive(Debug, Clone)]
pub struct NsqBackend {
    config: NsqConfig,
    factory: ConnectionFactory,
}

impl NsqBackend {
    pub fn new(config: NsqConfig, factory: ConnectionFactory) -> Self {
        Self { config, factory }
    }

    fn producer(&self, topic: &str) -> Result<NsqProducer, ConnectionError> {
        Ok(NsqProducer {
            conn: NsqConnection::open(&self.factory, &self.config.addr)?,
            topic: topic.to_string(),
            body: Vec::with_capacity(128),
        })
    }
}

impl Backend for NsqBackend {
    type Session = NsqProducer;

    fn name(&self) -> &'static str {
        "NSQ"
    }

    fn open(&self) -> Result<NsqProducer, ConnectionError> {
        self.producer(&self.config.topic)
    }
}

impl PubSubBackend for NsqBackend {
    type Publisher = NsqProducer;
    type Subscriber = NsqConsumer;

    fn name(&self) -> &'static str {
        "NSQ"
    }

    fn open_publisher(&self) -> Result<NsqProducer, ConnectionError> {
        self.producer(&self.config.pubsub_topic)
    }

    /// NSQ routes by topic; `key` travels inside message bodies and selects
    /// which deliveries count
    fn subscribe(&self, key: &str) -> Result<NsqConsumer, ConnectionError> {
        let mut conn = NsqConnection::open(&self.factory, &self.config.addr)?;
        let subscribe_failed = |source| ConnectionError::SubscribeFailed {
            key: key.to_string(),
            source,
        };

        conn.encoder
            .encode_sub(&self.config.pubsub_topic, &self.config.channel);
        conn.flush_encoded().map_err(subscribe_failed)?;
        conn.expect_ok().map_err(subscribe_failed)?;
        debug!(
            "Subscribed to {}/{} at {}",
            self.config.pubsub_topic, self.config.channel, self.config.addr
        );

        conn.encoder.encode_rdy(self.config.max_in_flight.max(1));
        conn.flush_encoded().map_err(subscribe_failed)?;

        Ok(NsqConsumer {
            conn,
            key: key.to_string(),
            skipped: 0,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::raw_connection::tests::unreachable_addr;
    use crate::utils::nsq::{
        encode_frame, encode_message_frame, MessageFrame, FRAME_TYPE_ERROR, FRAME_TYPE_RESPONSE,
        HEARTBEAT,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::io::{BufRead, Read};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Behaviour switches for the mock nsqd
    #[derive(Debug, Clone, Copy, Default)]
    pub(crate) struct MockNsqd {
        /// Greet each new subscriber with a heartbeat it must answer
        pub heartbeat: bool,
        /// Reject every `PUB` to a topic once it has a subscriber
        pub reject_after_subscribe: bool,
    }

    #[derive(Default)]
    struct MockTopic {
        /// Messages published while nobody was subscribed
        backlog: Vec<Vec<u8>>,
        subscribers: Vec<TcpStream>,
    }

    pub(crate) fn spawn_nsqd(heartbeat: bool) -> String {
        spawn_nsqd_with(MockNsqd {
            heartbeat,
            ..MockNsqd::default()
        })
    }

    /// Minimal nsqd
    ///
    /// Accepts `PUB`, `SUB`, `RDY`, `FIN`, `NOP` and `CLS`. Like nsqd, a
    /// topic without subscribers queues what is published and hands the
    /// queue to its first subscriber. Publishing to topic `forbidden`
    /// always fails.
    pub(crate) fn spawn_nsqd_with(options: MockNsqd) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let topics: Arc<Mutex<HashMap<String, MockTopic>>> = Arc::new(Mutex::new(HashMap::new()));
        let next_id = Arc::new(AtomicU64::new(0));

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let topics = Arc::clone(&topics);
                let next_id = Arc::clone(&next_id);
                thread::spawn(move || {
                    let mut writer = stream.try_clone().unwrap();
                    let mut reader = BufReader::new(stream);
                    let mut magic = [0u8; 4];
                    if reader.read_exact(&mut magic).is_err() || &magic != MAGIC_V2 {
                        return;
                    }

                    loop {
                        let mut line = String::new();
                        match reader.read_line(&mut line) {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        }
                        let parts: Vec<&str> = line.trim_end().split(' ').collect();
                        let topic_name = parts.get(1).copied().unwrap_or_default().to_string();
                        match parts[0] {
                            "PUB" => {
                                let mut len = [0u8; 4];
                                if reader.read_exact(&mut len).is_err() {
                                    return;
                                }
                                let mut body = vec![0u8; u32::from_be_bytes(len) as usize];
                                if reader.read_exact(&mut body).is_err() {
                                    return;
                                }

                                let mut topics = topics.lock();
                                let topic = topics.entry(topic_name.clone()).or_default();
                                let rejected = topic_name == "forbidden"
                                    || (options.reject_after_subscribe
                                        && !topic.subscribers.is_empty());
                                if rejected {
                                    let frame = encode_frame(FRAME_TYPE_ERROR, b"E_PUB_FAILED");
                                    writer.write_all(&frame).ok();
                                    continue;
                                }

                                let mut id = [b'0'; 16];
                                let n = next_id.fetch_add(1, Ordering::Relaxed);
                                id[..8].copy_from_slice(format!("{:08}", n % 100_000_000).as_bytes());
                                let frame = encode_message_frame(&MessageFrame {
                                    timestamp: 0,
                                    attempts: 1,
                                    id,
                                    body,
                                });
                                if topic.subscribers.is_empty() {
                                    topic.backlog.push(frame);
                                } else {
                                    for sub in topic.subscribers.iter_mut() {
                                        sub.write_all(&frame).ok();
                                    }
                                }
                                writer
                                    .write_all(&encode_frame(FRAME_TYPE_RESPONSE, b"OK"))
                                    .ok();
                            }
                            "SUB" => {
                                // Register and ack under the lock so no publish
                                // slips in between
                                let mut topics = topics.lock();
                                let topic = topics.entry(topic_name).or_default();
                                writer
                                    .write_all(&encode_frame(FRAME_TYPE_RESPONSE, b"OK"))
                                    .ok();
                                if options.heartbeat {
                                    writer
                                        .write_all(&encode_frame(FRAME_TYPE_RESPONSE, HEARTBEAT))
                                        .ok();
                                }
                                for frame in topic.backlog.drain(..) {
                                    writer.write_all(&frame).ok();
                                }
                                topic.subscribers.push(writer.try_clone().unwrap());
                            }
                            "CLS" => {
                                writer
                                    .write_all(&encode_frame(FRAME_TYPE_RESPONSE, b"CLOSE_WAIT"))
                                    .ok();
                            }
                            "RDY" | "FIN" | "NOP" => {}
                            _ => {
                                writer
                                    .write_all(&encode_frame(FRAME_TYPE_ERROR, b"E_INVALID"))
                                    .ok();
                            }
                        }
                    }
                });
            }
        });

        addr
    }

    pub(crate) fn backend(addr: &str, topic: &str) -> NsqBackend {
        NsqBackend::new(
            NsqConfig {
                addr: addr.to_string(),
                topic: topic.to_string(),
                pubsub_topic: topic.to_string(),
                channel: "benchmark#ephemeral".to_string(),
                max_in_flight: 100,
            },
            ConnectionFactory::default(),
        )
    }

    #[test]
    fn test_publish_ok() {
        let addr = spawn_nsqd(false);
        let mut producer = backend(&addr, "test").open().unwrap();
        assert!(producer.round_trip(&Request::write("s1", 1.0)).is_ok());
        assert!(producer.round_trip(&Request::write("s1", 2.0)).is_ok());
    }

    #[test]
    fn test_publish_error_frame_is_rejected() {
        let addr = spawn_nsqd(false);
        let mut producer = backend(&addr, "forbidden").open().unwrap();
        assert!(matches!(
            producer.round_trip(&Request::write("s1", 1.0)),
            Err(OperationError::Rejected(msg)) if msg == "E_PUB_FAILED"
        ));
    }

    #[test]
    fn test_read_unsupported() {
        let addr = spawn_nsqd(false);
        let mut producer = backend(&addr, "test").open().unwrap();
        assert!(matches!(
            producer.round_trip(&Request::read("s1", Default::default())),
            Err(OperationError::Unsupported { operation: "read", .. })
        ));
    }

    #[test]
    fn test_consumer_receives_and_answers_heartbeat() {
        let addr = spawn_nsqd(true);
        let backend = backend(&addr, "test");

        let mut consumer = backend.subscribe("s1").unwrap();
        let mut producer = backend.open_publisher().unwrap();

        producer.round_trip(&Request::write("s1", 1.0)).unwrap();
        producer.round_trip(&Request::write("s1", 2.0)).unwrap();

        assert!(consumer.next_delivery().is_ok());
        assert!(consumer.next_delivery().is_ok());
        consumer.close();
    }

    #[test]
    fn test_consumer_skips_queued_foreign_messages() {
        let addr = spawn_nsqd(false);
        let backend = backend(&addr, "test");
        let mut producer = backend.open_publisher().unwrap();

        // Queued before any subscriber exists, delivered on SUB
        for i in 0..3 {
            producer.round_trip(&Request::write("stale", i as f64)).unwrap();
        }

        let mut consumer = backend.subscribe("fresh").unwrap();
        producer.round_trip(&Request::write("fresh", 1.0)).unwrap();

        assert!(consumer.next_delivery().is_ok());
        assert_eq!(consumer.skipped, 3);
    }

    #[test]
    fn test_publisher_uses_pubsub_topic() {
        let addr = spawn_nsqd(false);
        let backend = NsqBackend::new(
            NsqConfig {
                pubsub_topic: "benchmark_pubsub".to_string(),
                ..backend(&addr, "test").config
            },
            ConnectionFactory::default(),
        );

        let writer = Backend::open(&backend).unwrap();
        let publisher = backend.open_publisher().unwrap();
        assert_eq!(writer.topic, "test");
        assert_eq!(publisher.topic, "benchmark_pubsub");
    }

    #[test]
    fn test_open_unreachable() {
        let backend = backend(&unreachable_addr(), "test");
        assert!(Backend::open(&backend).is_err());
        assert!(backend.subscribe("s1").is_err());
    }
}
